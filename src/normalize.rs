use crate::record::SupplyUnit;

fn clean(part: Option<&str>) -> Option<String> {
    part.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase)
}

/// Human-readable supply unit, e.g. `CAIXA 12 UNIDADE`.
///
/// Parts, space-joined and skipped when absent: supply-unit name, integer
/// capacity when positive, measurement-unit name (falling back to its code).
pub fn unit_label(unit: &SupplyUnit) -> String {
    let mut parts = Vec::with_capacity(3);
    if let Some(name) = clean(unit.name.as_deref()) {
        parts.push(name);
    }
    if let Some(cap) = unit.capacity.filter(|c| c.is_finite() && *c > 0.0) {
        parts.push((cap.trunc() as i64).to_string());
    }
    if let Some(measure) =
        clean(unit.measure_name.as_deref()).or_else(|| clean(unit.measure_code.as_deref()))
    {
        parts.push(measure);
    }
    parts.join(" ")
}
