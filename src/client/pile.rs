use domination::dialog::{AnimationDone, Pile};
use gloo::{events::EventListener, utils::document};
use itertools::Itertools;
use log::warn;
use wasm_bindgen::JsCast;
use web_sys::Element;

const PILE_ATTRIBUTE: &str = "data-pile";
const COLLAPSED_CLASS: &str = "pile-collapsed";

/// Piles the template marked with `data-pile`, or the supply if none are marked.
pub fn discover() -> Vec<Pile> {
    let marked = document()
        .query_selector_all(&format!("[{PILE_ATTRIBUTE}]"))
        .map(|nodes| {
            (0..nodes.length())
                .filter_map(|index| nodes.item(index))
                .filter_map(|node| node.dyn_into::<Element>().ok())
                .filter_map(|element| Pile::new(element.id(), element.get_attribute(PILE_ATTRIBUTE)))
                .collect_vec()
        })
        .unwrap_or_default();
    if !marked.is_empty() {
        return marked;
    }
    let supply = Pile::supply();
    match document().get_element_by_id(&supply.id) {
        Some(_) => vec![supply],
        None => vec![],
    }
}

/// Inner HTML of the pile's element, copied into the dialog on open.
pub fn contents(pile: &Pile) -> Option<String> {
    document()
        .get_element_by_id(&pile.id)
        .map(|element| element.inner_html())
}

/// Starts the slide animation; the returned listener must live until it fires.
pub fn slide(pile: &str, expand: bool, done: AnimationDone) -> Option<EventListener> {
    let Some(element) = document().get_element_by_id(pile) else {
        warn!("pile element #{pile} is gone");
        done.finish();
        return None;
    };
    if let Err(err) = element
        .class_list()
        .toggle_with_force(COLLAPSED_CLASS, !expand)
    {
        warn!("failed to slide pile #{pile}: {err:?}");
        done.finish();
        return None;
    }
    Some(EventListener::once(&element, "transitionend", move |_| {
        done.finish()
    }))
}
