use domination::{
    config::PageGlobals,
    page::{reload_target, Page},
    poller::protocol::{Fetch, FetchCallback, FetchError},
    schedule::{Scheduler, TaskHandle},
};
use gloo::{
    net::http::Request,
    timers::callback::{Interval, Timeout},
    utils::{body, document, window},
};
use log::warn;
use url::Url;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::spawn_local;

pub struct WebPage;

impl Page for WebPage {
    fn reload(&self) {
        // assigning the location again turns a POST result into a plain GET
        let location = window().location();
        let href = match location.href() {
            Ok(href) => href,
            Err(err) => {
                warn!("failed to read page location: {err:?}");
                return;
            }
        };
        let result = match reload_target(&href) {
            Ok(target) => location.set_href(target.as_str()),
            Err(err) => {
                warn!("cannot parse page location `{href}`: {err}");
                location.reload()
            }
        };
        if let Err(err) = result {
            warn!("failed to reload page: {err:?}");
        }
    }

    fn title(&self) -> String {
        document().title()
    }

    fn set_title(&self, title: &str) {
        document().set_title(title);
    }

    fn background(&self) -> String {
        body()
            .style()
            .get_property_value("background-color")
            .unwrap_or_default()
    }

    fn set_background(&self, color: &str) {
        let style = body().style();
        let result = if color.is_empty() {
            style.remove_property("background-color").map(drop)
        } else {
            style.set_property("background-color", color)
        };
        if let Err(err) = result {
            warn!("failed to set background to {color:?}: {err:?}");
        }
    }
}

pub struct GlooScheduler;

impl Scheduler for GlooScheduler {
    fn once(&self, delay_ms: u32, task: Box<dyn FnOnce()>) -> TaskHandle {
        let timeout = Timeout::new(delay_ms, task);
        TaskHandle::new(move || drop(timeout.cancel()))
    }

    fn every(&self, period_ms: u32, task: Box<dyn FnMut()>) -> TaskHandle {
        let interval = Interval::new(period_ms, task);
        TaskHandle::new(move || drop(interval.cancel()))
    }
}

pub struct NetFetch;

impl Fetch for NetFetch {
    fn get(&self, url: Url, done: FetchCallback) {
        spawn_local(async move {
            done(fetch_text(url.as_str()).await);
        });
    }
}

async fn fetch_text(url: &str) -> Result<String, FetchError> {
    let response = Request::get(url)
        .send()
        .await
        .map_err(|err| FetchError::Network(err.to_string()))?;
    if !response.ok() {
        return Err(FetchError::Status(response.status()));
    }
    response
        .text()
        .await
        .map_err(|err| FetchError::Network(err.to_string()))
}

fn global(name: &str) -> Option<JsValue> {
    js_sys::Reflect::get(&window(), &JsValue::from_str(name))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
}

pub fn read_page_globals() -> PageGlobals {
    PageGlobals {
        initial_seqno: global("initial_seqno").and_then(|value| value.as_f64()),
        game_name: global("game_name").and_then(|value| value.as_string()),
        script_root: global("$SCRIPT_ROOT").and_then(|value| value.as_string()),
        your_turn: global("your_turn").and_then(|value| value.as_bool()),
        location: window().location().href().ok(),
    }
}
