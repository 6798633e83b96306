//! An insertion-ordered sequence of renderable elements under one owning tag.

use std::slice;

use crate::element::Render;
use crate::error::FilterError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSequence<T> {
    tag: String,
    items: Vec<T>,
}

impl<T> ElementSequence<T> {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            items: Vec::new(),
        }
    }

    /// Appends `item`; `None` is silently ignored.
    pub fn add(&mut self, item: Option<T>) {
        if let Some(item) = item {
            self.items.push(item);
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: PartialEq> ElementSequence<T> {
    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    /// Removes the first member equal to `item`.
    pub fn remove(&mut self, item: &T) -> bool {
        match self.items.iter().position(|candidate| candidate == item) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }
}

impl<T: Clone> ElementSequence<T> {
    /// Copies every member into `dest`, starting at `offset`.
    pub fn copy_to(&self, dest: &mut [T], offset: usize) -> Result<(), FilterError> {
        if offset > dest.len() {
            return Err(FilterError::out_of_range(
                "offset",
                format!("{offset} exceeds destination length {}", dest.len()),
            ));
        }
        if dest.len() - offset < self.items.len() {
            return Err(FilterError::validation(
                "dest",
                format!(
                    "{} free slots after offset {offset}, {} needed",
                    dest.len() - offset,
                    self.items.len()
                ),
            ));
        }

        dest[offset..offset + self.items.len()].clone_from_slice(&self.items);
        Ok(())
    }
}

impl<T: Render> Render for ElementSequence<T> {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn render_into(&self, out: &mut String, with_tag: bool) {
        if self.items.is_empty() {
            return;
        }
        if with_tag {
            out.push('<');
            out.push_str(&self.tag);
            out.push('>');
        }
        for item in &self.items {
            item.render_into(out, true);
        }
        if with_tag {
            out.push_str("</");
            out.push_str(&self.tag);
            out.push('>');
        }
    }
}

impl<'a, T> IntoIterator for &'a ElementSequence<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> Extend<T> for ElementSequence<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}
