use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::sync::Once;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

use crate::endpoints::error::ErrorResponse;

pub type RecoverLayer = CatchPanicLayer<fn(Box<dyn Any + Send + 'static>) -> Response>;

thread_local! {
    // written by the panic hook on the panicking thread, taken by `panic_response` on the same poll
    static PANIC_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Turns a handler panic into a 500; the serving loop keeps running.
pub fn recover_layer() -> RecoverLayer {
    install_panic_hook();
    CatchPanicLayer::custom(panic_response as fn(Box<dyn Any + Send + 'static>) -> Response)
}

/// Chains onto the current hook and keeps the backtrace of the panic site. The layer only
/// sees the payload after unwinding, when the frames that failed are gone.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(Backtrace::force_capture()));
            previous(info);
        }));
    });
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let recover_info = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_owned());

    let debug_stack = PANIC_BACKTRACE
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or_else(Backtrace::force_capture);

    error!(
        kind = "error",
        recover_info = %recover_info,
        debug_stack = %debug_stack,
        "log system error"
    );

    ErrorResponse::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        StatusCode::INTERNAL_SERVER_ERROR
            .canonical_reason()
            .unwrap_or("Internal Server Error"),
    )
    .into_response()
}
