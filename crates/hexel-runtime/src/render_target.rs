//! Output buffers.

use indexmap::IndexMap;

/// One unnamed default buffer plus named slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderTarget {
    default: String,
    slots: IndexMap<String, String>,
    layout_content: String,
}

impl RenderTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, text: &str) {
        self.default.push_str(text);
    }

    pub fn append_to(&mut self, slot: &str, text: &str) {
        match self.slots.get_mut(slot) {
            Some(existing) => existing.push_str(text),
            None => {
                self.slots.insert(slot.to_string(), text.to_string());
            }
        }
    }

    /// Slot content, empty when the slot was never written.
    pub fn get(&self, slot: &str) -> &str {
        self.slots.get(slot).map_or("", String::as_str)
    }

    pub fn get_default(&self) -> &str {
        &self.default
    }

    pub fn into_default(self) -> String {
        self.default
    }

    /// Fold `other` into this target. Every slot of `other` is appended to
    /// the slot of the same name; its default buffer goes to `slot` when
    /// given, else to this default buffer.
    pub fn merge(&mut self, other: RenderTarget, slot: Option<&str>) {
        for (name, text) in &other.slots {
            self.append_to(name, text);
        }

        match slot {
            Some(slot) => self.append_to(slot, &other.default),
            None => self.append(&other.default),
        }
    }

    /// Content rendered before the current layout started.
    pub fn layout_content(&self) -> &str {
        &self.layout_content
    }

    /// Move the default buffer into the layout content.
    pub fn start_layout(&mut self) {
        self.layout_content = std::mem::take(&mut self.default);
    }
}
