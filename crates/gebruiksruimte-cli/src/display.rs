//! Vertical card display for norms, applications and usage-space reports.

use gebruiksruimte_core::aggregate::{AppliedSplit, AuditRow, Balance, CompanyTotals};
use gebruiksruimte_core::model::{Application, Parcel, UsageNorm};
use gebruiksruimte_core::{AggregationReport, CoefficientOutcome, CoefficientSchema, ImportOutcome, RedistributionMode, ResolvedNorm};

// ── Norms ──

pub fn print_resolved(parcel: &Parcel, crop: &str, year: i32, derogation: bool, norm: &ResolvedNorm) {
    println!("=== {} / {crop} ({year}) ===", parcel.name);
    println!();
    println!("Parcel");
    println!("  {:<26} {}", "soil_type", parcel.soil_type);
    print_opt("p_al", parcel.p_al);
    print_opt("p_cacl2", parcel.p_cacl2);
    println!("  {:<26} {}", "nv_area", yes_no(parcel.nv_area));
    println!("  {:<26} {}", "derogation", yes_no(derogation));
    println!();
    print_norm_values(norm.n_total_kg_ha, norm.n_animal_kg_ha, norm.p2o5_kg_ha);
}

pub fn print_usage_norm(norm: &UsageNorm) {
    println!("=== usage norm {} ===", norm.id);
    println!("  {:<26} {}", "company_id", norm.company_id);
    println!("  {:<26} {}", "parcel_id", norm.parcel_id);
    println!("  {:<26} {}", "crop_id", norm.crop_id);
    println!("  {:<26} {}", "year", norm.year);
    println!("  {:<26} {}", "derogation", yes_no(norm.derogation));
    println!();
    print_norm_values(norm.n_total_kg_ha, norm.n_animal_kg_ha, norm.p2o5_kg_ha);
}

fn print_norm_values(n_total: f64, n_animal: f64, p2o5: f64) {
    println!("Norms (kg/ha)");
    println!("  {:<26} {:.2}", "n_total", n_total);
    println!("  {:<26} {:.2}", "n_animal", n_animal);
    println!("  {:<26} {:.2}", "p2o5", p2o5);
    println!();
}

pub fn print_import(outcome: &ImportOutcome) {
    println!("Imported {} usage norms, skipped {}", outcome.imported, outcome.skipped.len());
    for skipped in &outcome.skipped {
        let row = &skipped.row;
        let year = row.year.map_or_else(|| "?".to_string(), |y| y.to_string());
        println!(
            "  {:<20} {:<20} {:<26} {:<6} {}",
            row.company, row.parcel, row.crop, year, skipped.reason
        );
    }
}

// ── Coefficients and applications ──

pub fn print_coefficient(fertilizer: &str, outcome: &CoefficientOutcome, source: Option<CoefficientSchema>) {
    println!("=== {fertilizer} ===");
    println!("  {:<26} {}", "category", outcome.category);
    println!(
        "  {:<26} {}",
        "context",
        if outcome.context.is_empty() { "-" } else { outcome.context.as_str() }
    );
    println!("  {:<26} {}%", "coefficient", outcome.percent);
    let source = match source {
        Some(CoefficientSchema::Legacy) => "legacy table",
        Some(CoefficientSchema::Current) => "current table",
        None => "no table loaded",
    };
    println!("  {:<26} {source}", "source");
}

pub fn print_application(app: &Application) {
    println!("=== application {} ===", app.id);
    println!("  {:<26} {}", "date", app.date.format("%d-%m-%Y"));
    println!("  {:<26} {}", "usage_norm_id", app.usage_norm_id);
    println!("  {:<26} {}", "fertilizer_id", app.fertilizer_id);
    println!("  {:<26} {:.1}", "quantity_kg_ha", app.quantity_kg_ha);
    if let Some(category) = &app.category {
        println!("  {:<26} {category}", "category");
    }
    if let Some(context) = app.context.as_deref().filter(|c| !c.is_empty()) {
        println!("  {:<26} {context}", "context");
    }
    print_opt("coefficient_pct", app.coefficient_pct);
    println!();
    println!("Raw (kg/ha)");
    println!("  {:<26} {:.2}", "n", app.raw.n);
    println!("  {:<26} {:.2}", "p2o5", app.raw.p2o5);
    println!("  {:<26} {:.2}", "k2o", app.raw.k2o);
    if let Some(eff) = app.effective {
        println!();
        println!("Effective (kg/ha)");
        println!("  {:<26} {:.2}", "n", eff.n);
        println!("  {:<26} {:.2}", "n_animal", eff.n_animal);
        println!("  {:<26} {:.2}", "p2o5", eff.p2o5);
    }
    println!();
}

// ── Reports ──

/// Print one card per company, then the grand totals.
pub fn print_report(report: &AggregationReport, audit: bool) {
    match &report.mode {
        RedistributionMode::PerCompany => println!("Usage space {}", report.year),
        RedistributionMode::HeadCompany(head) => {
            println!("Usage space {} (non-animal amounts on {head})", report.year)
        }
    }
    println!();

    for company in &report.companies {
        print_company(company);
    }
    print_company(&report.totals);

    if report.skipped > 0 {
        println!("{} applications excluded (see log)", report.skipped);
        println!();
    }
    if audit {
        print_audit(&report.audit);
    }
}

fn print_company(totals: &CompanyTotals) {
    println!("=== {} ===", totals.company_name);
    println!("  {:<26} {:.2}", "area_ha", totals.area_ha);
    println!();
    print_balance("Nitrogen total (kg)", &totals.n_total);
    print_balance("Nitrogen animal (kg)", &totals.n_animal);
    print_balance("Phosphate (kg)", &totals.p2o5);
    print_split(&totals.applied);
}

fn print_balance(header: &str, balance: &Balance) {
    println!("{header}");
    println!("  {:<26} {:.1}", "allowed", balance.allowed);
    println!("  {:<26} {:.1} ({:.0}%)", "applied", balance.applied, balance.percentage);
    if balance.shortfall > 0.0 {
        println!("  {:<26} {:.1}", "over", balance.shortfall);
    } else {
        println!("  {:<26} {:.1}", "remaining", balance.remaining);
    }
    println!();
}

fn print_split(split: &AppliedSplit) {
    println!("Applied by origin (kg)");
    println!("  {:<26} {:.1}", "n_animal", split.n_animal);
    println!("  {:<26} {:.1}", "n_other", split.n_other);
    println!("  {:<26} {:.1}", "p2o5_animal", split.p2o5_animal);
    println!("  {:<26} {:.1}", "p2o5_other", split.p2o5_other);
    println!("  {:<26} {:.1}", "k2o", split.k2o);
    println!();
}

fn print_audit(rows: &[AuditRow]) {
    println!("Applications");
    for row in rows {
        let coefficient = row
            .coefficient_pct
            .map_or_else(|| "-".to_string(), |c| format!("{c:.0}%"));
        println!(
            "  {} {:<12} {:<26} {:>6.2} ha {:>5} N {:>8.1} P {:>8.1}{}",
            row.date.format("%d-%m-%Y"),
            row.parcel_id,
            row.fertilizer,
            row.area_ha,
            coefficient,
            row.applied.n_animal + row.applied.n_other,
            row.applied.p2o5_animal + row.applied.p2o5_other,
            if row.recomputed { " *" } else { "" },
        );
    }
    println!();
}

fn print_opt(label: &str, value: Option<f64>) {
    if let Some(v) = value {
        println!("  {:<26} {v}", label);
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
