mod cli;
mod display;

use anyhow::{Context, bail};
use chrono::Datelike;
use clap::Parser;
use gebruiksruimte_core::model::RawAmounts;
use gebruiksruimte_core::parse::parse_date;
use gebruiksruimte_core::{CallContext, CoefficientInput, RedistributionMode, resolve_coefficient, resolve_usage_norm};
use gebruiksruimte_store::{DuckStore, NewApplication};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use cli::{Cli, Commands, NormCommand};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    tracing::debug!("gebruiksruimte v{}", env!("CARGO_PKG_VERSION"));

    let store = match &cli.db {
        Some(path) => DuckStore::open_persistent(path)
            .with_context(|| format!("opening database {}", path.display()))?,
        None => DuckStore::open().context("opening in-memory database")?,
    };
    if let Some(dir) = &cli.data_dir {
        store
            .load_dir(dir)
            .with_context(|| format!("loading {}", dir.display()))?;
    }

    let ctx = match &cli.acting_as {
        Some(target) => CallContext::impersonating(&cli.user, target),
        None => CallContext::new(&cli.user),
    };
    if ctx.is_impersonating() {
        tracing::info!(user = ctx.user_id(), acting_as = ctx.effective_user(), "acting on behalf of another user");
    }

    match cli.command {
        Commands::Load { dir } => {
            let loaded = store
                .load_dir(&dir)
                .with_context(|| format!("loading {}", dir.display()))?;
            if loaded.is_empty() {
                println!("No table files found in {}", dir.display());
            }
            for (table, count) in loaded {
                println!("  {:<32} {count} rows", table);
            }
        }

        Commands::Norm(cmd) => run_norm(&store, &ctx, cmd)?,

        Commands::Classify {
            fertilizer,
            application_type,
            own_farm,
            crop,
            soil,
            date,
        } => {
            let date = parse_date(&date)?;
            let table = store.coefficient_table()?;
            let outcome = resolve_coefficient(
                &ctx,
                &table,
                &CoefficientInput {
                    fertilizer_name: &fertilizer,
                    application_type: &application_type,
                    own_farm,
                    crop: &crop,
                    soil_type: &soil,
                    month: date.month(),
                    year: date.year(),
                },
            );
            display::print_coefficient(&fertilizer, &outcome, table.source);
        }

        Commands::Apply {
            norm,
            fertilizer,
            date,
            quantity,
            n,
            p2o5,
            k2o,
            own_farm,
            notes,
            edit,
        } => {
            let manual = match (n, p2o5, k2o) {
                (None, None, None) => None,
                (n, p2o5, k2o) => Some(RawAmounts {
                    n: n.unwrap_or(0.0),
                    p2o5: p2o5.unwrap_or(0.0),
                    k2o: k2o.unwrap_or(0.0),
                }),
            };
            let new = NewApplication {
                usage_norm_id: norm,
                fertilizer_id: fertilizer,
                date,
                quantity_kg_ha: quantity,
                manual,
                own_farm,
                notes,
            };
            let app = match edit {
                Some(id) => store.edit_application(&ctx, &id, &new)?,
                None => store.record_application(&ctx, &new)?,
            };
            display::print_application(&app);
        }

        Commands::Report {
            year,
            head_company,
            company,
            audit,
            json,
        } => {
            let mode = head_company.map_or(RedistributionMode::PerCompany, RedistributionMode::HeadCompany);
            let report = store.report(&ctx, year, &mode, company.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                display::print_report(&report, audit);
            }
        }

        Commands::Show { table, limit } => {
            if !store.table_exists(&table)? {
                bail!("no table named '{table}'");
            }
            let batches = store.query_arrow(&format!("SELECT * FROM {table} LIMIT {limit}"))?;
            arrow::util::pretty::print_batches(&batches)?;
        }

        Commands::Export { table, out } => {
            if !store.table_exists(&table)? {
                bail!("no table named '{table}'");
            }
            let rows = store
                .export_table(&table, &out)
                .with_context(|| format!("exporting {table}"))?;
            println!("Wrote {rows} rows to {}", out.display());
        }
    }

    Ok(())
}

fn run_norm(store: &DuckStore, ctx: &CallContext, cmd: NormCommand) -> anyhow::Result<()> {
    if !matches!(cmd, NormCommand::List { .. }) && !store.has_reference_data() {
        tracing::warn!("no crop norms loaded; run `load` or pass --data-dir");
    }
    match cmd {
        NormCommand::Resolve {
            parcel,
            crop,
            year,
            derogation,
        } => {
            let parcel = store.parcel(ctx.effective_user(), &parcel)?;
            let crop = store.crop_norm(&crop)?;
            let tables = store.reference_tables()?;
            let norm = resolve_usage_norm(ctx, &tables, &parcel, &crop.crop, derogation, year)?;
            display::print_resolved(&parcel, &crop.crop, year, derogation, &norm);
        }
        NormCommand::Create {
            company,
            parcel,
            crop,
            year,
            derogation,
        } => {
            let norm = store.create_usage_norm(ctx, &company, &parcel, &crop, year, derogation)?;
            display::print_usage_norm(&norm);
        }
        NormCommand::Recalculate { id, derogation } => {
            let norm = store.recalculate_usage_norm(ctx, &id, derogation)?;
            display::print_usage_norm(&norm);
        }
        NormCommand::Import { file, json } => {
            let rows = store
                .read_import_rows(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let outcome = store.import_usage_norms(ctx, &rows)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                display::print_import(&outcome);
            }
        }
        NormCommand::List { year } => {
            for norm in store.usage_norms(ctx.effective_user(), year)? {
                display::print_usage_norm(&norm);
            }
        }
    }
    Ok(())
}
