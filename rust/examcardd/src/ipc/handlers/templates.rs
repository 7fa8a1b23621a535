use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use crate::template::Template;
use serde_json::json;

fn handle_templates_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let templates: Vec<serde_json::Value> = Template::ALL
        .iter()
        .map(|t| {
            let cfg = t.config();
            json!({
                "id": t.id(),
                "label": t.label(),
                "title": cfg.title,
                "warning": cfg.warning,
                "showLogo": cfg.show_logo,
                "showQr": cfg.show_qr,
                "showSignatureImage": cfg.show_signature_image,
                "parafColumn": cfg.paraf_column,
                "accent": cfg.accent.css(),
            })
        })
        .collect();
    ok(
        &req.id,
        json!({
            "templates": templates,
            "selected": state.session.form.template.id(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "templates.list" => Some(handle_templates_list(state, req)),
        _ => None,
    }
}
