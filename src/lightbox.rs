//! Full-size modal viewer over the image listing.
//!
//! Keybindings while open:
//! - ArrowLeft: Previous image
//! - ArrowRight: Next image
//! - Escape: Close

use serde::Serialize;
use tracing::debug;

/// Keys the lightbox reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Escape,
    Other,
}

impl Key {
    pub fn from_name(name: &str) -> Self {
        match name {
            "ArrowLeft" => Key::ArrowLeft,
            "ArrowRight" => Key::ArrowRight,
            "Escape" => Key::Escape,
            _ => Key::Other,
        }
    }
}

/// Snapshot of what the lightbox displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightboxView {
    pub index: usize,
    pub url: String,
    pub alt: String,
    pub has_prev: bool,
    pub has_next: bool,
    pub preload: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Lightbox {
    urls: Vec<String>,
    index: usize,
    open: bool,
}

impl Lightbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the listing. Closes the viewer and rewinds to the first image.
    pub fn set_urls(&mut self, urls: Vec<String>) {
        self.urls = urls;
        self.index = 0;
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Opens the viewer on `index`. Out-of-range indices are ignored.
    pub fn open(&mut self, index: usize) -> bool {
        if index >= self.urls.len() {
            return false;
        }
        self.index = index;
        self.open = true;
        debug!(index, "Lightbox opened");
        true
    }

    pub fn close(&mut self) {
        if self.open {
            debug!(index = self.index, "Lightbox closed");
        }
        self.open = false;
    }

    pub fn has_prev(&self) -> bool {
        self.index > 0
    }

    pub fn has_next(&self) -> bool {
        self.index + 1 < self.urls.len()
    }

    pub fn next(&mut self) {
        if self.has_next() {
            self.index += 1;
        }
    }

    pub fn prev(&mut self) {
        if self.has_prev() {
            self.index -= 1;
        }
    }

    /// Handles a key press. Returns whether the key was consumed.
    pub fn handle_key(&mut self, key: Key) -> bool {
        if !self.open {
            return false;
        }
        match key {
            Key::ArrowLeft => self.prev(),
            Key::ArrowRight => self.next(),
            Key::Escape => self.close(),
            Key::Other => return false,
        }
        true
    }

    pub fn current_url(&self) -> Option<&str> {
        if !self.open {
            return None;
        }
        self.urls.get(self.index).map(String::as_str)
    }

    /// Alt text of the current image, 1-based.
    pub fn alt_text(&self) -> String {
        format!("Image {}", self.index + 1)
    }

    /// Neighbouring images worth warming: next first, then previous.
    pub fn preload_targets(&self) -> Vec<usize> {
        let mut targets = Vec::with_capacity(2);
        if self.has_next() {
            targets.push(self.index + 1);
        }
        if self.has_prev() {
            targets.push(self.index - 1);
        }
        targets
    }

    pub fn view(&self) -> Option<LightboxView> {
        let url = self.current_url()?.to_string();
        Some(LightboxView {
            index: self.index,
            url,
            alt: self.alt_text(),
            has_prev: self.has_prev(),
            has_next: self.has_next(),
            preload: self
                .preload_targets()
                .into_iter()
                .map(|i| self.urls[i].clone())
                .collect(),
        })
    }
}
