//! Host functions registered on every engine.

use std::sync::Arc;

use rhai::serde::{from_dynamic, to_dynamic};
use rhai::{Array, Dynamic, Engine, EvalAltResult, Map, Position};
use serde_json::Value;
use tokio::runtime::Handle;

use unictl_app::execution_context::{ExecutionContext, LogLevel};
use unictl_domain::action::ActionRequest;
use unictl_domain::time::to_rfc3339;

type HelperResult<T> = Result<T, Box<EvalAltResult>>;

pub(crate) fn register(engine: &mut Engine, context: &Arc<ExecutionContext>, handle: &Handle) {
    register_logging(engine, context);
    register_states(engine, context);
    register_clock(engine, context);
    register_actions(engine, context, handle);
}

fn register_logging(engine: &mut Engine, context: &Arc<ExecutionContext>) {
    let ctx = Arc::clone(context);
    engine.on_print(move |text| ctx.log(LogLevel::Info, text));
    let ctx = Arc::clone(context);
    engine.on_debug(move |text, _source, _pos| ctx.log(LogLevel::Debug, text));

    for (name, level) in [
        ("info", LogLevel::Info),
        ("warn", LogLevel::Warn),
        ("error", LogLevel::Error),
    ] {
        let ctx = Arc::clone(context);
        engine.register_fn(name, move |message: Dynamic| {
            ctx.log(level, &message.to_string());
        });
    }
}

fn register_states(engine: &mut Engine, context: &Arc<ExecutionContext>) {
    let ctx = Arc::clone(context);
    engine.register_fn("get_state", move |entity_id: &str| -> Dynamic {
        ctx.state(entity_id)
            .map_or(Dynamic::UNIT, |s| Dynamic::from(s.state.clone()))
    });

    let ctx = Arc::clone(context);
    engine.register_fn(
        "get_attribute",
        move |entity_id: &str, name: &str| -> HelperResult<Dynamic> {
            ctx.attribute(entity_id, name)
                .map_or(Ok(Dynamic::UNIT), to_dynamic)
        },
    );

    let ctx = Arc::clone(context);
    engine.register_fn("is_on", move |entity_id: &str| ctx.is_on(entity_id));
    let ctx = Arc::clone(context);
    engine.register_fn("is_off", move |entity_id: &str| ctx.is_off(entity_id));

    let ctx = Arc::clone(context);
    engine.register_fn(
        "filter_by_domain",
        move |domain: &str| -> HelperResult<Array> {
            ctx.filter_by_domain(domain)
                .into_iter()
                .map(|state| {
                    to_dynamic(serde_json::json!({
                        "entity_id": state.entity_id,
                        "state": state.state,
                        "attributes": state.attributes,
                    }))
                })
                .collect()
        },
    );
}

fn register_clock(engine: &mut Engine, context: &Arc<ExecutionContext>) {
    let ctx = Arc::clone(context);
    engine.register_fn("now", move || to_rfc3339(ctx.now()));
    let ctx = Arc::clone(context);
    engine.register_fn("timestamp", move || ctx.now().timestamp_millis());
}

fn register_actions(engine: &mut Engine, context: &Arc<ExecutionContext>, handle: &Handle) {
    let invoke = {
        let ctx = Arc::clone(context);
        let handle = handle.clone();
        move |request: ActionRequest| -> HelperResult<Dynamic> {
            let value = handle
                .block_on(ctx.call_action(request))
                .map_err(|err| runtime_error(err.to_string()))?;
            to_dynamic(value)
        }
    };

    let call = invoke.clone();
    engine.register_fn(
        "call_service",
        move |domain: &str, action: &str, data: Map| -> HelperResult<Dynamic> {
            let params: Value = from_dynamic(&Dynamic::from_map(data))?;
            call(ActionRequest::new(domain, action, params))
        },
    );
    let call = invoke.clone();
    engine.register_fn(
        "call_service",
        move |domain: &str, action: &str| -> HelperResult<Dynamic> {
            call(ActionRequest::new(domain, action, Value::Object(serde_json::Map::new())))
        },
    );

    let call = invoke.clone();
    engine.register_fn("turn_on", move |entity_id: &str| {
        call(ActionRequest::turn_on(entity_id))
    });
    let call = invoke.clone();
    engine.register_fn("turn_off", move |entity_id: &str| {
        call(ActionRequest::turn_off(entity_id))
    });
    let call = invoke.clone();
    engine.register_fn("toggle", move |entity_id: &str| {
        call(ActionRequest::toggle(entity_id))
    });
    engine.register_fn("notify", move |message: &str| {
        invoke(ActionRequest::notify(message))
    });
}

fn runtime_error(message: String) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(message.into(), Position::NONE))
}
