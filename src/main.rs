mod client;

use client::{storage_keys, Client, ClientProps};
use domination::config::ClientConfig;
use gloo::{
    storage::{LocalStorage, Storage},
    utils::{body, document},
};
use log::LevelFilter;
use web_sys::Element;

fn mount_point() -> Option<Element> {
    if let Some(element) = document().get_element_by_id("domination-client") {
        return Some(element);
    }
    let element = document().create_element("div").ok()?;
    element.set_id("domination-client");
    body().append_child(&element).ok()?;
    Some(element)
}

fn main() {
    console_error_panic_hook::set_once();
    client::init_logging(
        LocalStorage::get::<String>(storage_keys::LOG_LEVEL)
            .ok()
            .and_then(|level| level.parse().ok())
            .unwrap_or(LevelFilter::Info),
    );

    let config = ClientConfig::from_globals(
        client::read_page_globals(),
        LocalStorage::get(storage_keys::POLL_CONFIG).unwrap_or_default(),
        LocalStorage::get(storage_keys::REMINDER).unwrap_or_default(),
    );
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            log::error!("page client not started: {err}");
            return;
        }
    };
    let Some(root) = mount_point() else {
        log::error!("page client not started: no element to mount on");
        return;
    };
    let props = ClientProps {
        config,
        piles: client::discover_piles(),
    };
    yew::Renderer::<Client>::with_root_and_props(root, props).render();
}
