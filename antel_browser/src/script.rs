//! Scripts evaluated inside page documents.

/// Resolves a serialized [`crate::Locator`] and applies an action to the
/// first match. Invoked as `(LOCATE)(locator, action, value)`; always returns
/// `{ found, text }` and never throws for a bad selector.
pub(crate) const LOCATE: &str = r#"(function(loc, action, value) {
  function norm(s) { return String(s || '').replace(/\s+/g, ' ').trim(); }
  function visible(el) {
    if (!el || !el.isConnected) return false;
    const style = el.ownerDocument.defaultView.getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden') return false;
    const r = el.getBoundingClientRect();
    return r.width > 0 && r.height > 0;
  }
  function accessibleName(el) {
    const label = el.getAttribute('aria-label');
    if (label) return norm(label);
    const by = el.getAttribute('aria-labelledby');
    if (by) {
      const ref = el.ownerDocument.getElementById(by);
      if (ref) return norm(ref.textContent);
    }
    if (el.id) {
      const lbl = el.ownerDocument.querySelector('label[for="' + CSS.escape(el.id) + '"]');
      if (lbl) return norm(lbl.textContent);
    }
    if (el.closest && el.closest('label')) return norm(el.closest('label').textContent);
    return norm(el.value || el.textContent || el.getAttribute('placeholder') || el.getAttribute('title') || el.getAttribute('name'));
  }
  const ROLES = {
    textbox: 'input:not([type]), input[type="text"], input[type="email"], input[type="tel"], input[type="search"], textarea, [role="textbox"]',
    button: 'button, input[type="submit"], input[type="button"], [role="button"]',
    link: 'a[href], [role="link"]',
    menuitem: '[role="menuitem"], [role="menu"] a, nav a'
  };
  function candidates() {
    switch (loc.kind) {
      case 'css':
        return Array.from(document.querySelectorAll(loc.selector));
      case 'role': {
        const sel = ROLES[loc.role] || ('[role="' + loc.role + '"]');
        const all = Array.from(document.querySelectorAll(sel));
        if (!loc.name) return all;
        const re = new RegExp(loc.name, 'i');
        return all.filter(el => re.test(accessibleName(el)));
      }
      case 'text': {
        const needle = String(loc.text).toLowerCase();
        return Array.from(document.querySelectorAll(loc.selector))
          .filter(el => norm(el.textContent).toLowerCase().includes(needle));
      }
      case 'link_in': {
        const needle = String(loc.contains).toLowerCase();
        const box = Array.from(document.querySelectorAll(loc.container))
          .find(el => norm(el.textContent).toLowerCase().includes(needle));
        if (!box) return [];
        if (box.matches('a[href]')) return [box];
        const inner = box.querySelector('a[href]');
        if (inner) return [inner];
        const outer = box.closest('a[href]');
        return outer ? [outer] : [];
      }
    }
    return [];
  }
  let els;
  try { els = candidates(); } catch (_) { return { found: false, text: null }; }
  const passive = action === 'text' || action === 'href';
  const el = els.find(visible) || (passive ? els[0] : undefined);
  if (!el) return { found: false, text: null };
  switch (action) {
    case 'visible':
      return { found: true, text: null };
    case 'click':
      el.scrollIntoView({ block: 'center' });
      el.click();
      return { found: true, text: null };
    case 'focus':
      el.focus();
      return { found: true, text: null };
    case 'fill': {
      el.focus();
      const proto = el.tagName === 'TEXTAREA'
        ? el.ownerDocument.defaultView.HTMLTextAreaElement.prototype
        : el.ownerDocument.defaultView.HTMLInputElement.prototype;
      const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
      setter.call(el, value);
      el.dispatchEvent(new Event('input', { bubbles: true }));
      el.dispatchEvent(new Event('change', { bubbles: true }));
      return { found: true, text: null };
    }
    case 'text':
      return { found: true, text: el.textContent };
    case 'href':
      return { found: true, text: el.href || el.getAttribute('href') };
  }
  return { found: false, text: null };
})"#;

/// Load progress of the main document.
pub(crate) const READY_PROBE: &str = r#"(function() {
  return {
    ready_state: document.readyState,
    resources: (performance.getEntriesByType('resource') || []).length
  };
})()"#;

/// Serialized DOM plus rendered body text of the current document.
pub(crate) const CAPTURE: &str = r#"(function() {
  return {
    html: document.documentElement ? document.documentElement.outerHTML : '',
    body_text: document.body ? document.body.innerText : ''
  };
})()"#;
