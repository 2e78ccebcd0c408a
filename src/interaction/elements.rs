//! Interactive element discovery
//!
//! A script tags every interactive element with `data-minion-id` so later
//! operations can address it with a stable attribute selector. Descriptors
//! are recomputed on every page and never persisted.

use crate::browser::PageDriver;
use crate::error::{ExtractionError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

/// Attribute carrying the element id
pub const ELEMENT_ID_ATTR: &str = "data-minion-id";

/// Upper bound on descriptors per page
pub const MAX_ELEMENTS: usize = 80;

const DISCOVERY_SCRIPT: &str = r#"
(() => {
    const attr = '__ATTR__';
    const limit = __LIMIT__;
    document.querySelectorAll('[' + attr + ']').forEach(el => el.removeAttribute(attr));

    const labelFor = (el) => {
        if (el.id) {
            const label = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
            if (label && label.innerText.trim()) return label.innerText;
        }
        const wrap = el.closest('label');
        return wrap ? wrap.innerText : '';
    };

    const candidates = document.querySelectorAll(
        'a[href], button, [role="button"], input:not([type="hidden"]), textarea, select'
    );
    const out = [];
    for (const el of candidates) {
        if (out.length >= limit) break;
        const tag = el.tagName.toLowerCase();
        const type = (el.getAttribute('type') || '').toLowerCase();
        const isField = tag === 'input' || tag === 'textarea' || tag === 'select';
        const toggle = type === 'checkbox' || type === 'radio';
        const style = window.getComputedStyle(el);
        const rect = el.getBoundingClientRect();
        const visible = style.visibility !== 'hidden' && style.display !== 'none'
            && rect.width > 0 && rect.height > 0;

        const text = isField ? '' : (el.innerText || el.textContent || '');
        const buttonValue = (type === 'submit' || type === 'button' || type === 'reset') ? el.value : '';
        const label = [
            text,
            el.getAttribute('aria-label'),
            el.getAttribute('placeholder'),
            el.getAttribute('title'),
            labelFor(el),
            buttonValue,
            el.getAttribute('name'),
        ].find(v => v && v.trim()) || '';

        const id = String(out.length);
        el.setAttribute(attr, id);
        out.push({
            id,
            tag,
            type,
            role: el.getAttribute('role') || '',
            label: label.replace(/\s+/g, ' ').trim().substring(0, 100),
            visible,
            value: isField && !toggle ? String(el.value || '') : null,
            checked: toggle ? !!el.checked : null,
            options: tag === 'select'
                ? Array.from(el.options).map(o => (o.text || o.value || '').trim()).filter(Boolean)
                : [],
        });
    }
    return out;
})()
"#;

/// Category of an interactive element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Button or role=button
    Button,
    /// Anchor with an href
    Link,
    /// Text-like input or textarea
    Input,
    /// Dropdown
    Select,
    /// Checkbox
    Checkbox,
    /// Radio button
    Radio,
}

impl ElementKind {
    /// Buttons and links
    pub fn is_clickable(self) -> bool {
        matches!(self, Self::Button | Self::Link)
    }

    /// Checkboxes and radios
    pub fn is_toggle(self) -> bool {
        matches!(self, Self::Checkbox | Self::Radio)
    }

    fn classify(tag: &str, input_type: &str, role: &str) -> Self {
        match (tag, input_type) {
            ("select", _) => Self::Select,
            ("input", "checkbox") => Self::Checkbox,
            ("input", "radio") => Self::Radio,
            ("input", "button" | "submit" | "reset" | "image") => Self::Button,
            ("input", _) | ("textarea", _) => Self::Input,
            ("a", _) if role != "button" => Self::Link,
            _ => Self::Button,
        }
    }
}

/// One discovered interactive element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    /// Value of the `data-minion-id` attribute
    pub id: String,
    /// Selector usable for later operations
    pub selector: String,
    /// Element category
    pub kind: ElementKind,
    /// Human-readable label
    pub label: String,
    /// Rendered and not hidden
    pub visible: bool,
    /// Current value of a field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Checked state of a toggle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    /// `type` attribute of inputs (`textarea` for text areas)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    /// Option texts of a dropdown
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl ElementDescriptor {
    /// Attribute selector for an element id
    pub fn selector_for(id: &str) -> String {
        format!("[{}=\"{}\"]", ELEMENT_ID_ATTR, id)
    }

    /// Text or search box that can take the goal as a query
    pub fn is_text_input(&self) -> bool {
        self.kind == ElementKind::Input
            && matches!(self.input_type.as_deref(), None | Some("text" | "search"))
    }

    /// Input that looks like a site search box
    pub fn is_search_field(&self) -> bool {
        if !self.is_text_input() {
            return false;
        }
        let label = self.label.to_lowercase();
        self.input_type.as_deref() == Some("search")
            || label.contains("search")
            || label.contains("query")
            || label == "q"
    }

    /// One line for planner prompts
    pub fn describe(&self) -> String {
        let mut line = format!("{:?} {} \"{}\"", self.kind, self.selector, self.label);
        if let Some(checked) = self.checked {
            line.push_str(if checked { " [checked]" } else { " [unchecked]" });
        }
        if !self.options.is_empty() {
            line.push_str(&format!(" options={:?}", self.options));
        }
        line
    }
}

/// Per-category element counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementCounts {
    /// Buttons and links
    pub clickable: usize,
    /// Text inputs and text areas
    pub inputs: usize,
    /// Dropdowns
    pub dropdowns: usize,
    /// Checkboxes and radios
    pub toggles: usize,
}

impl ElementCounts {
    /// Count descriptors by category
    pub fn tally(elements: &[ElementDescriptor]) -> Self {
        elements.iter().fold(Self::default(), |mut counts, el| {
            match el.kind {
                ElementKind::Button | ElementKind::Link => counts.clickable += 1,
                ElementKind::Input => counts.inputs += 1,
                ElementKind::Select => counts.dropdowns += 1,
                ElementKind::Checkbox | ElementKind::Radio => counts.toggles += 1,
            }
            counts
        })
    }
}

#[derive(Deserialize)]
struct RawElement {
    id: String,
    #[serde(default)]
    tag: String,
    #[serde(default, rename = "type")]
    input_type: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    visible: bool,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    checked: Option<bool>,
    #[serde(default)]
    options: Vec<String>,
}

impl From<RawElement> for ElementDescriptor {
    fn from(raw: RawElement) -> Self {
        let kind = ElementKind::classify(&raw.tag, &raw.input_type, &raw.role);
        let input_type = match (kind, raw.tag.as_str()) {
            (ElementKind::Input, "textarea") => Some("textarea".to_string()),
            (ElementKind::Input, _) if raw.input_type.is_empty() => Some("text".to_string()),
            (ElementKind::Input, _) => Some(raw.input_type),
            _ => None,
        };
        Self {
            selector: ElementDescriptor::selector_for(&raw.id),
            id: raw.id,
            kind,
            label: raw.label,
            visible: raw.visible,
            value: raw.value,
            checked: raw.checked,
            input_type,
            options: raw.options,
        }
    }
}

/// Tag the page's interactive elements and describe them
#[instrument(skip(page))]
pub async fn discover(page: &dyn PageDriver) -> Result<Vec<ElementDescriptor>> {
    let script = DISCOVERY_SCRIPT
        .replace("__ATTR__", ELEMENT_ID_ATTR)
        .replace("__LIMIT__", &MAX_ELEMENTS.to_string());
    let value = page.evaluate(&script).await?;
    let elements = parse_elements(value)?;
    debug!("Discovered {} interactive elements", elements.len());
    Ok(elements)
}

/// Descriptors from the discovery script's result
pub fn parse_elements(value: Value) -> Result<Vec<ElementDescriptor>> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    let raw: Vec<RawElement> = serde_json::from_value(value)
        .map_err(|e| ExtractionError::ParsingFailed(format!("element list: {}", e)))?;
    Ok(raw.into_iter().take(MAX_ELEMENTS).map(ElementDescriptor::from).collect())
}
