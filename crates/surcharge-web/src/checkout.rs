//! Checkout Page Wiring
//!
//! Listens for payment-method changes on `form.checkout`, tells the server
//! through the background endpoint and fires `update_checkout` on the body
//! once the fees are recalculated.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::{JsCast, JsValue, prelude::Closure};
use web_sys::{CustomEvent, Document, Event, HtmlInputElement};

use surcharge_core::notifier::{PAYMENT_METHOD_FIELD, UPDATE_CHECKOUT_EVENT};
use surcharge_core::{ChangeNotifier, NotifierAction};

use crate::api;

const CHECKOUT_FORM: &str = "form.checkout";
const ERROR_ELEMENT: &str = "surcharge-error";

struct Page {
    document: Document,
    ajax_url: String,
    notifier: RefCell<ChangeNotifier>,
}

/// Bootstrap the session and attach the change listener
pub async fn init() -> Result<(), JsValue> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let form = document
        .query_selector(CHECKOUT_FORM)?
        .ok_or_else(|| JsValue::from_str("checkout form not found"))?;

    let info = api::fetch_checkout().await.map_err(|e| JsValue::from_str(&e))?;

    let page = Rc::new(Page {
        document,
        ajax_url: info.ajax_url,
        notifier: RefCell::new(ChangeNotifier::new(info.nonce)),
    });

    let on_change = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
        let Some(input) = event
            .target()
            .and_then(|t| t.dyn_into::<HtmlInputElement>().ok())
        else {
            return;
        };
        if input.name() != PAYMENT_METHOD_FIELD {
            return;
        }

        let action = page.notifier.borrow_mut().select(input.value());
        wasm_bindgen_futures::spawn_local(drive(page.clone(), action));
    });

    form.add_event_listener_with_callback("change", on_change.as_ref().unchecked_ref())?;
    on_change.forget();

    Ok(())
}

/// Run notifier actions until it settles
async fn drive(page: Rc<Page>, mut action: NotifierAction) {
    loop {
        action = match action {
            NotifierAction::Send(request) => {
                let result = api::update_surcharge(&page.ajax_url, &request).await;
                let mut notifier = page.notifier.borrow_mut();
                match result {
                    Ok(()) => notifier.acknowledge(&request.payment_method),
                    Err(e) => notifier.fail(&request.payment_method, e),
                }
            }
            NotifierAction::RefreshCheckout => {
                clear_error(&page.document);
                if let Err(e) = refresh_checkout(&page.document) {
                    web_sys::console::error_1(&e);
                }
                return;
            }
            NotifierAction::ShowError(message) => {
                show_error(&page.document, &message);
                return;
            }
            NotifierAction::Ignore => return,
        };
    }
}

fn refresh_checkout(document: &Document) -> Result<(), JsValue> {
    let body = document.body().ok_or_else(|| JsValue::from_str("no body"))?;
    let event = CustomEvent::new(UPDATE_CHECKOUT_EVENT)?;
    body.dispatch_event(&event)?;
    Ok(())
}

fn show_error(document: &Document, message: &str) {
    web_sys::console::error_1(&JsValue::from_str(message));
    if let Some(el) = document.get_element_by_id(ERROR_ELEMENT) {
        el.set_text_content(Some(message));
    }
}

fn clear_error(document: &Document) {
    if let Some(el) = document.get_element_by_id(ERROR_ELEMENT) {
        el.set_text_content(None);
    }
}
