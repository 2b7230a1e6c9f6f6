use id_arena::{Arena, Id};
use winit::dpi::PhysicalSize;

use crate::overlay::fragment::Element;

pub type ElementId = Id<OverlayElement>;

pub type ClickHandler = Box<dyn FnMut(&Element)>;

pub struct OverlayElement {
    pub element: Element,
    click_handlers: Vec<ClickHandler>,
}

impl OverlayElement {
    pub fn listener_count(&self) -> usize {
        self.click_handlers.len()
    }
}

/// Root container for overlay elements, drawn above the 3D scene.
///
/// Pointer input passes through the surface itself; only attached elements
/// receive clicks.
pub struct OverlaySurface {
    size: PhysicalSize<u32>,
    elements: Arena<OverlayElement>,
}

impl OverlaySurface {
    pub fn new(size: PhysicalSize<u32>) -> Self {
        Self {
            size,
            elements: Arena::new(),
        }
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn set_size(&mut self, size: PhysicalSize<u32>) {
        self.size = size;
    }

    pub fn append_child(&mut self, element: Element) -> ElementId {
        self.elements.alloc(OverlayElement {
            element,
            click_handlers: Vec::new(),
        })
    }

    pub fn get(&self, id: ElementId) -> Option<&OverlayElement> {
        self.elements.get(id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Attached elements carrying `class`, in insertion order.
    pub fn query_selector_all<'a>(&'a self, class: &'a str) -> impl Iterator<Item = ElementId> + 'a {
        self.elements
            .iter()
            .filter(move |(_, overlay)| overlay.element.has_class(class))
            .map(|(id, _)| id)
    }

    pub fn add_click_listener(&mut self, id: ElementId, handler: ClickHandler) -> bool {
        match self.elements.get_mut(id) {
            Some(overlay) => {
                overlay.click_handlers.push(handler);
                true
            }
            None => false,
        }
    }

    /// Runs the click handlers of one element and returns how many ran.
    pub fn dispatch_click(&mut self, id: ElementId) -> usize {
        let Some(overlay) = self.elements.get_mut(id) else {
            return 0;
        };

        let OverlayElement {
            element,
            click_handlers,
        } = overlay;

        for handler in click_handlers.iter_mut() {
            handler(element);
        }

        click_handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::overlay::fragment::parse_fragment;

    fn element(src: &str) -> Element {
        parse_fragment(src).unwrap().unwrap()
    }

    #[test]
    fn query_by_class() {
        let mut surface = OverlaySurface::new(PhysicalSize::new(800, 600));
        let a = surface.append_child(element(r#"<div class="tag a">A</div>"#));
        surface.append_child(element(r#"<div class="other">B</div>"#));
        let c = surface.append_child(element(r#"<div class="tag">C</div>"#));

        let found: Vec<_> = surface.query_selector_all("tag").collect();
        assert_eq!(found, [a, c]);
    }

    #[test]
    fn clicks_reach_only_the_clicked_element() {
        let mut surface = OverlaySurface::new(PhysicalSize::new(800, 600));
        let a = surface.append_child(element(r#"<div id="a">A</div>"#));
        let b = surface.append_child(element(r#"<div id="b">B</div>"#));

        let clicked = Rc::new(RefCell::new(Vec::new()));
        for id in [a, b] {
            let clicked = clicked.clone();
            surface.add_click_listener(
                id,
                Box::new(move |element| {
                    clicked
                        .borrow_mut()
                        .push(element.id().unwrap_or_default().to_string())
                }),
            );
        }

        assert_eq!(surface.dispatch_click(b), 1);
        assert_eq!(*clicked.borrow(), ["b"]);
    }
}
