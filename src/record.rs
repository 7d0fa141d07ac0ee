//! Purchase records as disclosed by the price research API.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::location::StateCode;
use crate::normalize::unit_label;

/// Stable identity of a record within one loaded dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey(pub u32);

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Supply-unit sub-fields as sent upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplyUnit {
    pub name: Option<String>,
    pub capacity: Option<f64>,
    pub measure_name: Option<String>,
    pub measure_code: Option<String>,
}

/// One row of the upstream `resultado` array. Every field is optional, so
/// rows with missing fields still deserialize; a field of the wrong type
/// fails the page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    #[serde(default, deserialize_with = "deserialize_opaque_id")]
    pub id_compra: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opaque_id")]
    pub id_item_compra: Option<String>,
    #[serde(default)]
    pub numero_item_compra: Option<i64>,
    #[serde(default)]
    pub codigo_item_catalogo: Option<u64>,
    #[serde(default)]
    pub descricao_item: Option<String>,
    #[serde(default)]
    pub municipio: Option<String>,
    #[serde(default)]
    pub estado: Option<String>,
    #[serde(default)]
    pub data_resultado: Option<String>,
    #[serde(default)]
    pub quantidade: Option<f64>,
    #[serde(default)]
    pub preco_unitario: Option<f64>,
    #[serde(default)]
    pub nome_unidade_fornecimento: Option<String>,
    #[serde(default)]
    pub capacidade_unidade_fornecimento: Option<f64>,
    #[serde(default)]
    pub nome_unidade_medida: Option<String>,
    #[serde(default)]
    pub sigla_unidade_medida: Option<String>,
}

// Purchase ids arrive as strings on some endpoints and as numbers on others.
fn deserialize_opaque_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

impl RawRecord {
    /// Identity used to drop rows repeated across pages of one request.
    pub fn fingerprint(&self) -> String {
        let line = self
            .id_item_compra
            .clone()
            .or_else(|| self.numero_item_compra.map(|n| n.to_string()))
            .unwrap_or_default();
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.id_compra.as_deref().unwrap_or(""),
            line,
            self.codigo_item_catalogo.unwrap_or(0),
            self.preco_unitario.map(f64::to_bits).unwrap_or(0),
            self.quantidade.map(f64::to_bits).unwrap_or(0),
            self.data_resultado.as_deref().unwrap_or(""),
        )
    }

    pub fn supply_unit(&self) -> SupplyUnit {
        SupplyUnit {
            name: self.nome_unidade_fornecimento.clone(),
            capacity: self.capacidade_unidade_fornecimento,
            measure_name: self.nome_unidade_medida.clone(),
            measure_code: self.sigla_unidade_medida.clone(),
        }
    }
}

/// Why a raw row could not become a [`PurchaseRecord`].
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    MissingDate,
    BadDate(String),
    BadPrice,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseRecord {
    pub key: RecordKey,
    pub purchase_id: String,
    pub item_code: Option<u64>,
    pub description: String,
    pub municipality: String,
    pub state: Option<StateCode>,
    pub result_date: NaiveDate,
    pub quantity: f64,
    pub unit_price: f64,
    pub supply_unit: SupplyUnit,
    pub unit_label: String,
}

impl PurchaseRecord {
    pub fn from_raw(key: RecordKey, raw: &RawRecord) -> Result<Self, Rejection> {
        let date_text = raw.data_resultado.as_deref().ok_or(Rejection::MissingDate)?;
        let result_date = parse_result_date(date_text)
            .ok_or_else(|| Rejection::BadDate(date_text.to_string()))?;
        let unit_price = match raw.preco_unitario {
            Some(p) if p.is_finite() && p >= 0.0 => p,
            _ => return Err(Rejection::BadPrice),
        };
        let supply_unit = raw.supply_unit();
        Ok(Self {
            key,
            purchase_id: raw.id_compra.clone().unwrap_or_default(),
            item_code: raw.codigo_item_catalogo,
            description: raw.descricao_item.clone().unwrap_or_default(),
            municipality: raw.municipio.clone().unwrap_or_default(),
            state: raw.estado.as_deref().and_then(|s| s.parse().ok()),
            result_date,
            quantity: raw.quantidade.unwrap_or(0.0),
            unit_price,
            unit_label: unit_label(&supply_unit),
            supply_unit,
        })
    }

    /// "municipality - UF"
    pub fn location(&self) -> String {
        let state = self.state.map(|s| s.as_str()).unwrap_or("");
        format!("{} - {}", self.municipality, state)
    }
}

/// Accepts a bare date, a naive timestamp or an RFC3339 timestamp.
pub fn parse_result_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_json() -> &'static str {
        r#"{
            "idCompra": "15013405900312023",
            "idItemCompra": 991,
            "codigoItemCatalogo": 459670,
            "descricaoItem": "Papel A4",
            "municipio": "Recife",
            "estado": "PE",
            "dataResultado": "2023-05-10T00:00:00",
            "quantidade": 100,
            "precoUnitario": 24.9,
            "nomeUnidadeFornecimento": "resma",
            "capacidadeUnidadeFornecimento": 500.0,
            "nomeUnidadeMedida": "folha",
            "siglaUnidadeMedida": "FL"
        }"#
    }

    #[test]
    fn parses_upstream_row() {
        let raw: RawRecord = serde_json::from_str(raw_json()).unwrap();
        assert_eq!(raw.id_item_compra.as_deref(), Some("991"));
        let rec = PurchaseRecord::from_raw(RecordKey(0), &raw).unwrap();
        assert_eq!(rec.purchase_id, "15013405900312023");
        assert_eq!(rec.state, Some(StateCode::PE));
        assert_eq!(rec.result_date, NaiveDate::from_ymd_opt(2023, 5, 10).unwrap());
        assert_eq!(rec.unit_label, "RESMA 500 FOLHA");
        assert_eq!(rec.location(), "Recife - PE");
    }

    #[test]
    fn rejects_negative_price_and_bad_dates() {
        let mut raw: RawRecord = serde_json::from_str(raw_json()).unwrap();
        raw.preco_unitario = Some(-1.0);
        assert_eq!(PurchaseRecord::from_raw(RecordKey(0), &raw), Err(Rejection::BadPrice));

        raw.preco_unitario = Some(1.0);
        raw.data_resultado = Some("yesterday".into());
        assert!(matches!(
            PurchaseRecord::from_raw(RecordKey(0), &raw),
            Err(Rejection::BadDate(_))
        ));
    }

    #[test]
    fn date_formats() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(parse_result_date("2024-01-31"), Some(d));
        assert_eq!(parse_result_date("2024-01-31T10:22:01.123"), Some(d));
        assert_eq!(parse_result_date("2024-01-31T10:22:01-03:00"), Some(d));
        assert_eq!(parse_result_date("31/01/2024"), None);
    }

    #[test]
    fn fingerprint_ignores_page_position() {
        let a: RawRecord = serde_json::from_str(raw_json()).unwrap();
        let b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
        let mut c = a.clone();
        c.id_item_compra = Some("992".into());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
