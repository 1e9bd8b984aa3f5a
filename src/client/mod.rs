use domination::{
    config::ClientConfig,
    dialog::{Pile, PileDialog, ToggleLock},
    page::Page,
    poller::Poller,
    reminder::TurnReminder,
    schedule::Scheduler,
};
use gloo::{events::EventListener, utils::window};
use std::rc::Rc;
use web_sys::{Element, HtmlDialogElement, MouseEvent};
use yew::prelude::*;

mod logger;
pub use logger::init as init_logging;

mod pile;
pub use pile::discover as discover_piles;

mod web;
use web::*;
pub use web::read_page_globals;

pub mod storage_keys {
    pub static POLL_CONFIG: &str = "poll_config";
    pub static REMINDER: &str = "reminder";
    pub static LOG_LEVEL: &str = "log_level";
}

#[derive(Debug)]
pub enum Msg {
    ShowPile(usize),
    ClosePile,
    PileClosed,
    SlidePile(usize),
    PointerMoved,
}

#[derive(Debug, PartialEq, Properties)]
pub struct ClientProps {
    pub config: ClientConfig,
    pub piles: Vec<Pile>,
}

pub struct Client {
    dialog_ref: NodeRef,
    cards_ref: NodeRef,
    piles: PileDialog,
    reminder: TurnReminder,
    pointer_listener: Option<EventListener>,
    slide_listener: Option<EventListener>,
}

impl Client {
    fn get_dialog(&self) -> Option<HtmlDialogElement> {
        self.dialog_ref.cast::<HtmlDialogElement>()
    }

    fn show_pile(&mut self, pile: &Pile) {
        let Some(dialog) = self.get_dialog() else {
            return;
        };
        if !self.piles.open(&pile.id) {
            return;
        }
        if let Some(cards) = self.cards_ref.cast::<Element>() {
            cards.set_inner_html(&pile::contents(pile).unwrap_or_default());
        }
        if let Err(err) = dialog.show_modal() {
            log::warn!("failed to open pile dialog: {err:?}");
            self.pile_closed();
        }
    }

    fn close_pile(&self) {
        if let Some(dialog) = self.get_dialog() {
            // fires `close`, which lands in `Msg::PileClosed`
            dialog.close();
        }
    }

    fn pile_closed(&mut self) {
        self.piles.close();
        if let Some(cards) = self.cards_ref.cast::<Element>() {
            cards.set_inner_html("");
        }
    }

    fn listen_for_pointer(ctx: &Context<Self>) -> EventListener {
        let scope = ctx.link().clone();
        EventListener::new(&window(), "mousemove", move |_| {
            scope.send_message(Msg::PointerMoved)
        })
    }
}

impl Component for Client {
    type Message = Msg;
    type Properties = ClientProps;

    fn create(ctx: &Context<Self>) -> Self {
        let config = &ctx.props().config;
        let scheduler: Rc<dyn Scheduler> = Rc::new(GlooScheduler);
        let page: Rc<dyn Page> = Rc::new(WebPage);
        let poller = Poller::new(
            config.endpoint.clone(),
            config.poll,
            config.initial_seqno,
            scheduler.clone(),
            Rc::new(NetFetch),
            page.clone(),
        );
        poller.start();

        let reminder = TurnReminder::new(config.reminder.clone(), scheduler.clone(), page);
        let pointer_listener = (config.your_turn && reminder.start())
            .then(|| Self::listen_for_pointer(ctx));

        Self {
            dialog_ref: NodeRef::default(),
            cards_ref: NodeRef::default(),
            piles: PileDialog::new(
                poller,
                ToggleLock::new(scheduler, ToggleLock::DEFAULT_SETTLE_MS),
            ),
            reminder,
            pointer_listener,
            slide_listener: None,
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        let piles = &ctx.props().piles;
        match msg {
            Msg::ShowPile(index) => {
                if let Some(pile) = piles.get(index) {
                    self.show_pile(pile);
                }
            }
            Msg::ClosePile => self.close_pile(),
            Msg::PileClosed => self.pile_closed(),
            Msg::SlidePile(index) => {
                let Some(pile) = piles.get(index) else {
                    return false;
                };
                if let Some(step) = self.piles.toggle_slide(&pile.id) {
                    self.slide_listener = pile::slide(&step.pile, step.expand, step.done);
                }
            }
            Msg::PointerMoved => {
                self.reminder.acknowledge();
                self.pointer_listener = None;
                return false;
            }
        }
        true
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        let scope = ctx.link();
        let piles = &ctx.props().piles;
        let stop_propagation = |e: MouseEvent| e.stop_propagation();
        let title = self
            .piles
            .showing()
            .and_then(|id| piles.iter().find(|pile| pile.id == id))
            .map(|pile| pile.title.clone());
        html! {<>
            <dialog ref={self.dialog_ref.clone()}
                    class="pile-dialog"
                    onclick={scope.callback(|_| Msg::ClosePile)}
                    onclose={scope.callback(|_| Msg::PileClosed)}>
                <div onclick={stop_propagation}>
                    <h2>{ title }</h2>
                    <div ref={self.cards_ref.clone()} class="pile-cards"></div>
                    <form method="dialog">
                        <button class="close-dialog">{ "✕" }</button>
                    </form>
                </div>
            </dialog>
            <div id="pile-buttons">
            {
                for piles.iter().enumerate().map(|(index, pile)| html! {
                    <span class="pile-button" key={pile.id.clone()}>
                        <button onclick={scope.callback(move |_| Msg::ShowPile(index))}>
                            { format!("Show {}", pile.title) }
                        </button>
                        <button class="slide" onclick={scope.callback(move |_| Msg::SlidePile(index))}>
                            { "▾" }
                        </button>
                    </span>
                })
            }
            </div>
        </>}
    }
}
