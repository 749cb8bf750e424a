//! Loading placeholder laid over an image while its animation is replayed.

use dom::{Document, DomError, ElementId, Size};
use sniffer::HeaderInfo;

/// Size constraints cleared once explicit dimensions are assigned.
const SIZE_CONSTRAINTS: [&str; 4] = ["min-width", "max-width", "min-height", "max-height"];

/// Elements created by [`PlaceholderOverlay::mount`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayHandle {
    pub image: ElementId,
    pub wrapper: ElementId,
    pub indicator: ElementId,
    /// Box size the wrapper was fixed to.
    pub size: Size,
}

/// Mounts and removes the wrapper + indicator pair around an image.
#[derive(Debug, Clone)]
pub struct PlaceholderOverlay {
    class: String,
    text: String,
}

impl PlaceholderOverlay {
    pub fn new(class: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            text: text.into(),
        }
    }

    /// Wrap `image` in a fixed-size container and put the indicator in front of it.
    ///
    /// When the image carries neither a `width` nor a `height` attribute, both
    /// are set from the sniffed header and min/max size styles are cleared.
    pub fn mount(
        &self,
        doc: &mut dyn Document,
        image: ElementId,
        header: &HeaderInfo,
    ) -> Result<OverlayHandle, DomError> {
        if !has_dimension(doc, image, "width") && !has_dimension(doc, image, "height") {
            doc.set_attribute(image, "width", &header.width.to_string())?;
            doc.set_attribute(image, "height", &header.height.to_string())?;
            for property in SIZE_CONSTRAINTS {
                doc.set_style(image, property, "")?;
            }
        }

        let size = doc.rendered_size(image);

        let wrapper = doc.create_element("div");
        doc.set_style(wrapper, "position", "relative")?;
        doc.set_style(wrapper, "width", &px(size.width))?;
        doc.set_style(wrapper, "height", &px(size.height))?;

        let indicator = doc.create_element("div");
        doc.add_class(indicator, &self.class)?;
        doc.set_style(indicator, "width", &px(size.width))?;
        doc.set_style(indicator, "height", &px(size.height))?;
        doc.set_style(indicator, "line-height", &px(size.height))?;
        doc.set_text(indicator, &self.text)?;

        if let Err(e) = doc.wrap(image, wrapper) {
            // Neither element was attached; drop them again.
            let _ = doc.remove(indicator);
            let _ = doc.remove(wrapper);
            return Err(e);
        }
        doc.append_child(wrapper, indicator)?;

        Ok(OverlayHandle {
            image,
            wrapper,
            indicator,
            size,
        })
    }

    /// Remove the indicator and unwrap the image back into its original parent.
    ///
    /// Parts that are already gone are skipped.
    pub fn unmount(&self, doc: &mut dyn Document, handle: &OverlayHandle) -> Result<(), DomError> {
        if doc.contains(handle.indicator) {
            doc.remove(handle.indicator)?;
        }
        if !doc.contains(handle.wrapper) {
            return Ok(());
        }

        if doc.parent(handle.image) == Some(handle.wrapper) {
            if doc.parent(handle.wrapper).is_some() {
                doc.unwrap_parent(handle.image)?;
            }
        } else {
            // The image was taken out of the wrapper; only the empty shell is left.
            doc.remove(handle.wrapper)?;
        }
        Ok(())
    }
}

fn has_dimension(doc: &dyn Document, image: ElementId, name: &str) -> bool {
    doc.attribute(image, name).is_some_and(|v| !v.is_empty())
}

fn px(value: u32) -> String {
    format!("{}px", value)
}
