//! Record types for the `portabilidades` table.

use serde_json::Value;

use crate::text::field_text;

/// Default `origen` when the submission does not carry one.
pub const DEFAULT_ORIGIN: &str = "landing-movistar";

/// Insert payload for a portability request. The generated row id is the
/// folio quoted back to the customer and in both notification emails.
#[derive(Debug, Clone)]
pub struct NewPortability {
    pub nombre_completo: String,
    pub email: String,
    pub numero_portar: String,
    pub nip: String,
    pub numero_contacto: String,
    pub plan_elegido: String,
    pub calle: String,
    pub numero_exterior: String,
    pub codigo_postal: String,
    pub descripcion_vivienda: String,
    pub acepta_tyc: bool,
    pub origen: String,
    pub user_agent: String,
    pub ine_frente_url: String,
    pub ine_reverso_url: String,
    pub storage_carpeta: String,
}

impl NewPortability {
    /// Flatten a submission's JSON payload into a row, with the folder key and
    /// attachment URLs produced by the storage step. Missing fields become
    /// empty strings rather than failing the intake.
    pub fn from_submission(data: &Value, user_agent: &str, folder: &str, frente_url: &str, reverso_url: &str) -> Self {
        let origen = match field_text(data, "origen") {
            s if s.is_empty() => DEFAULT_ORIGIN.to_string(),
            s => s,
        };
        Self {
            nombre_completo: field_text(data, "nombreCompleto"),
            email: field_text(data, "email"),
            numero_portar: field_text(data, "numeroPortar"),
            nip: field_text(data, "nip"),
            numero_contacto: field_text(data, "numeroContacto"),
            plan_elegido: field_text(data, "planElegido"),
            calle: field_text(data, "calle"),
            numero_exterior: field_text(data, "numeroExterior"),
            codigo_postal: field_text(data, "codigoPostal"),
            descripcion_vivienda: field_text(data, "descripcionVivienda"),
            acepta_tyc: matches!(data.get("aceptaTyC"), Some(Value::Bool(true)))
                || matches!(data.get("aceptaTyC"), Some(Value::String(s)) if s == "true"),
            origen,
            user_agent: user_agent.to_string(),
            ine_frente_url: frente_url.to_string(),
            ine_reverso_url: reverso_url.to_string(),
            storage_carpeta: folder.to_string(),
        }
    }
}
