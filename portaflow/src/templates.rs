//! HTML email builders.
//!
//! Two templates: a customer-facing confirmation with a fixed field subset,
//! and an operations notification that dumps every submitted field plus the
//! attachment links and request metadata. Every interpolated value is
//! HTML-escaped; submissions are user-controlled input.

use chrono::{DateTime, Datelike, Utc};
use serde_json::Value;

use crate::text::{escape_html, field_text, normalize_value, pretty_label};

/// Accent color used by both templates.
const BRAND_COLOR: &str = "#00A9E0";

/// WhatsApp contact link shown in the customer confirmation.
const WHATSAPP_URL: &str = "https://wa.me/522228774712";

/// Keys the operations team wants first, in this order. Any remaining
/// submission keys follow alphabetically.
pub const ORDER_FIRST: [&str; 13] = [
    "nombreCompleto",
    "email",
    "numeroPortar",
    "nip",
    "numeroContacto",
    "planElegido",
    "calle",
    "numeroExterior",
    "codigoPostal",
    "descripcionVivienda",
    "aceptaTyC",
    "origen",
    "userAgent",
];

fn priority(key: &str) -> usize {
    ORDER_FIRST.iter().position(|k| *k == key).unwrap_or(usize::MAX)
}

/// Submission entries in display order: fixed-priority keys first, the rest
/// alphabetical. Deterministic regardless of input insertion order.
pub fn ordered_entries(data: &Value) -> Vec<(&String, &Value)> {
    let Some(map) = data.as_object() else {
        return Vec::new();
    };
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| priority(a.0).cmp(&priority(b.0)).then_with(|| a.0.cmp(b.0)));
    entries
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Context for the operations email beyond the submission itself.
pub struct OpsEmailContext<'a> {
    pub folio: i64,
    pub frente_url: &'a str,
    pub reverso_url: &'a str,
    pub created_at: DateTime<Utc>,
    pub client_ip: &'a str,
    pub user_agent: &'a str,
}

/// Operations email: every submitted field, attachment links, and request
/// metadata, keyed by folio in the header.
pub fn ops_email_html(data: &Value, ctx: &OpsEmailContext) -> String {
    let fecha = format_timestamp(ctx.created_at);

    let rows: String = ordered_entries(data)
        .into_iter()
        .map(|(k, v)| {
            format!(
                r#"
    <tr>
      <td style="padding:8px 10px;width:38%;color:#6B7280;border-bottom:1px solid #E5E7EB;">{}</td>
      <td style="padding:8px 10px;border-bottom:1px solid #E5E7EB;">{}</td>
    </tr>
  "#,
                escape_html(&pretty_label(k)),
                escape_html(&normalize_value(v))
            )
        })
        .collect();

    let origen = match field_text(data, "origen") {
        s if s.is_empty() => "landing-movistar".to_string(),
        s => s,
    };
    let user_agent = match field_text(data, "userAgent") {
        s if s.is_empty() => ctx.user_agent.to_string(),
        s => s,
    };
    let frente = if ctx.frente_url.is_empty() { "#" } else { ctx.frente_url };
    let reverso = if ctx.reverso_url.is_empty() { "#" } else { ctx.reverso_url };

    format!(
        r#"<!doctype html>
<html><head><meta name="viewport" content="width=device-width, initial-scale=1"/><meta http-equiv="Content-Type" content="text/html; charset=UTF-8" /></head>
<body style="margin:0;padding:0;background:#f5f7fb;font-family:Arial,Helvetica,sans-serif">
  <table role="presentation" width="100%" cellspacing="0" cellpadding="0" style="background:#f5f7fb;padding:24px 0">
    <tr><td align="center">
      <table role="presentation" width="720" cellpadding="0" cellspacing="0" style="max-width:720px;background:#fff;border-radius:16px;overflow:hidden">
        <tr><td style="background:{BRAND_COLOR};padding:16px 20px;color:#fff;font-weight:700">Nueva solicitud de portabilidad · Folio {folio}</td></tr>
        <tr><td style="padding:18px 20px">
          <table role="presentation" width="100%" cellpadding="0" cellspacing="0" style="border:1px solid #E5E7EB;border-radius:12px;border-collapse:collapse;overflow:hidden">
            <tr><td colspan="2" style="background:#F9FAFB;padding:10px 12px;font-weight:700;color:#111827;border-bottom:1px solid #E5E7EB">Datos capturados en el formulario</td></tr>
            {rows}
          </table>

          <table role="presentation" width="100%" cellpadding="0" cellspacing="0" style="margin-top:14px;border:1px solid #E5E7EB;border-radius:12px;border-collapse:collapse;overflow:hidden">
            <tr><td colspan="2" style="background:#F9FAFB;padding:10px 12px;font-weight:700;color:#111827;border-bottom:1px solid #E5E7EB">Adjuntos / Storage</td></tr>
            <tr><td style="padding:10px 12px;width:38%;color:#6B7280;border-bottom:1px solid #E5E7EB">INE Frente</td>
                <td style="padding:10px 12px;border-bottom:1px solid #E5E7EB"><a href="{frente}" target="_blank">Abrir archivo</a></td></tr>
            <tr><td style="padding:10px 12px;color:#6B7280">INE Reverso</td>
                <td style="padding:10px 12px"><a href="{reverso}" target="_blank">Abrir archivo</a></td></tr>
          </table>

          <table role="presentation" width="100%" cellpadding="0" cellspacing="0" style="margin-top:14px;border:1px solid #E5E7EB;border-radius:12px;border-collapse:collapse;overflow:hidden">
            <tr><td colspan="2" style="background:#F9FAFB;padding:10px 12px;font-weight:700;color:#111827;border-bottom:1px solid #E5E7EB">Meta</td></tr>
            <tr><td style="padding:8px 10px;width:38%;color:#6B7280;border-bottom:1px solid #E5E7EB">Folio</td><td style="padding:8px 10px;border-bottom:1px solid #E5E7EB">{folio}</td></tr>
            <tr><td style="padding:8px 10px;color:#6B7280;border-bottom:1px solid #E5E7EB">Fecha creación</td><td style="padding:8px 10px;border-bottom:1px solid #E5E7EB">{fecha}</td></tr>
            <tr><td style="padding:8px 10px;color:#6B7280;border-bottom:1px solid #E5E7EB">Origen</td><td style="padding:8px 10px;border-bottom:1px solid #E5E7EB">{origen}</td></tr>
            <tr><td style="padding:8px 10px;color:#6B7280;border-bottom:1px solid #E5E7EB">User-Agent</td><td style="padding:8px 10px;border-bottom:1px solid #E5E7EB">{user_agent}</td></tr>
            <tr><td style="padding:8px 10px;color:#6B7280">IP</td><td style="padding:8px 10px">{ip}</td></tr>
          </table>
        </td></tr>
        <tr><td style="padding:12px 20px;background:#F3F4F6;color:#6B7280;font-size:12px">Este correo fue generado automáticamente.</td></tr>
      </table>
    </td></tr>
  </table>
</body></html>"#,
        folio = ctx.folio,
        fecha = escape_html(&fecha),
        origen = escape_html(&origen),
        user_agent = escape_html(&user_agent),
        ip = escape_html(ctx.client_ip),
    )
}

/// Customer confirmation email: first name, folio, and a fixed field subset.
/// The NIP is shown in full.
pub fn customer_email_html(data: &Value, folio: i64, created_at: DateTime<Utc>) -> String {
    let full_name = field_text(data, "nombreCompleto");
    let nombre = escape_html(full_name.split_whitespace().next().unwrap_or(""));
    let numero = escape_html(&field_text(data, "numeroPortar"));
    let plan = escape_html(&field_text(data, "planElegido"));
    let tel = escape_html(&field_text(data, "numeroContacto"));
    let calle = escape_html(&field_text(data, "calle"));
    let numext = escape_html(&field_text(data, "numeroExterior"));
    let cp = escape_html(&field_text(data, "codigoPostal"));
    let nip = escape_html(&field_text(data, "nip"));
    let fecha = escape_html(&format_timestamp(created_at));
    let year = created_at.year();

    format!(
        r#"<!doctype html>
<html>
<head>
<meta name="viewport" content="width=device-width, initial-scale=1"/>
<meta http-equiv="Content-Type" content="text/html; charset=UTF-8" />
<title>Confirmación de solicitud</title>
<style>.preheader{{display:none!important;visibility:hidden;opacity:0;color:transparent;height:0;width:0;overflow:hidden;mso-hide:all}}a[x-apple-data-detectors]{{color:inherit!important;text-decoration:none!important}}</style>
</head>
<body style="margin:0;padding:0;background:#f5f7fb;font-family:Arial,Helvetica,sans-serif">
  <span class="preheader">Tu proceso de portabilidad ha iniciado. Folio {folio}.</span>
  <table role="presentation" width="100%" cellspacing="0" cellpadding="0" style="background:#f5f7fb;padding:24px 0">
    <tr><td align="center">
      <table role="presentation" width="600" cellpadding="0" cellspacing="0" style="max-width:600px;background:#fff;border-radius:16px;overflow:hidden">
        <tr><td style="background:{BRAND_COLOR};padding:20px 24px" align="left">
          <div style="color:#fff;font-weight:700;font-size:18px">Distribuidor Movistar</div>
        </td></tr>
        <tr><td style="padding:24px">
          <h1 style="margin:0 0 12px;font-size:22px;color:#111827">¡Gracias, {nombre}!</h1>
          <p style="margin:0 0 16px;color:#374151;line-height:1.5">Hemos recibido tu solicitud de portabilidad y <b>tu proceso ha iniciado</b>.</p>
          <p style="margin:0 0 16px;color:#374151;line-height:1.5">
            <b>Folio:</b> {folio}<br/>
            <b>Fecha:</b> {fecha}
          </p>
          <table role="presentation" cellpadding="0" cellspacing="0" width="100%" style="border-collapse:collapse;margin:12px 0;border:1px solid #E5E7EB;border-radius:12px">
            <tr><td colspan="2" style="background:#F9FAFB;color:#111827;font-weight:700;padding:10px 12px;border-bottom:1px solid #E5E7EB">Resumen de tu solicitud</td></tr>
            <tr><td style="padding:10px 12px;width:40%;color:#6B7280">Número a portar</td><td style="padding:10px 12px">{numero}</td></tr>
            <tr><td style="padding:10px 12px;color:#6B7280">NIP</td><td style="padding:10px 12px">{nip}</td></tr>
            <tr><td style="padding:10px 12px;color:#6B7280">Plan elegido</td><td style="padding:10px 12px">{plan}</td></tr>
            <tr><td style="padding:10px 12px;color:#6B7280">Teléfono de contacto</td><td style="padding:10px 12px">{tel}</td></tr>
            <tr><td style="padding:10px 12px;color:#6B7280">Dirección</td><td style="padding:10px 12px">{calle} {numext}, CP {cp}</td></tr>
          </table>
          <div style="margin-top:20px">
            <a href="{WHATSAPP_URL}" style="background:{BRAND_COLOR};color:#fff;text-decoration:none;padding:12px 18px;border-radius:10px;display:inline-block;font-weight:700">Atención por WhatsApp</a>
          </div>
          <p style="margin:20px 0 0;font-size:12px;color:#6B7280">Si no solicitaste este trámite, por favor responde este correo.</p>
        </td></tr>
        <tr><td style="padding:16px 24px;background:#F3F4F6;color:#6B7280;font-size:12px">© {year} Distribuidor Movistar. Todos los derechos reservados.</td></tr>
      </table>
    </td></tr>
  </table>
</body></html>"#
    )
}
