//! Structural locators for markup elements.

use scraper::ElementRef;

/// Builds a `tag:nth-child(n)` chain from the document element down to
/// `element`, joined by ` > `. The result is a valid CSS selector that
/// selects exactly `element` in the same document.
#[must_use]
pub fn locator_for(element: ElementRef<'_>) -> String {
    let mut segments = Vec::new();
    let mut current = Some(element);

    while let Some(el) = current {
        let name = el.value().name();
        let parent = el.parent().and_then(ElementRef::wrap);
        match parent {
            Some(parent) => {
                let position = parent
                    .children()
                    .filter(|child| child.value().is_element())
                    .position(|child| child.id() == el.id())
                    .map_or(1, |index| index + 1);
                segments.push(format!("{name}:nth-child({position})"));
            }
            None => segments.push(name.to_string()),
        }
        current = parent;
    }

    segments.reverse();
    segments.join(" > ")
}
