use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_empty_collection, output_success, output_table};
use crate::cli::OutputFormat;
use crate::services::tenant_service::{CreateTenantInput, ListTenantsQuery};
use crate::services::TenantService;
use crate::state::AppState;

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "Create a tenant")]
    Create {
        #[arg(help = "Display name")]
        name: String,
        #[arg(help = "Subdomain label, e.g. acme for acme.example.com")]
        subdomain: String,
        #[arg(long, help = "Primary color as #rgb or #rrggbb")]
        color: Option<String>,
        #[arg(long, help = "Absolute http(s) logo URL")]
        logo_url: Option<String>,
    },

    #[command(about = "List tenants")]
    List {
        #[arg(long, help = "Case-insensitive match on name or subdomain")]
        search: Option<String>,
        #[arg(long, help = "Only active (true) or inactive (false) tenants")]
        active: Option<bool>,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 50)]
        page_size: i64,
    },

    #[command(about = "Deactivate a tenant; its subdomain stops resolving")]
    Deactivate {
        #[arg(help = "Tenant subdomain")]
        subdomain: String,
    },

    #[command(about = "Reactivate a tenant")]
    Activate {
        #[arg(help = "Tenant subdomain")]
        subdomain: String,
    },
}

pub async fn handle(cmd: TenantCommands, state: &AppState, output_format: OutputFormat) -> anyhow::Result<()> {
    let service = TenantService::new(state);

    match cmd {
        TenantCommands::Create { name, subdomain, color, logo_url } => {
            let tenant = service
                .create(CreateTenantInput { name, subdomain, primary_color: color, logo_url })
                .await?;
            output_success(
                output_format,
                &format!("Created tenant '{}' ({})", tenant.subdomain, tenant.id),
                Some(json!(tenant)),
            )
        }
        TenantCommands::List { search, active, page, page_size } => {
            let result = service
                .list(ListTenantsQuery { page: Some(page), page_size: Some(page_size), search, active })
                .await?;
            if result.data.is_empty() {
                return output_empty_collection(output_format, "tenants", "No tenants found");
            }
            output_table(
                output_format,
                "tenants",
                &result.data,
                &[("ID", 36), ("SUBDOMAIN", 20), ("NAME", 30), ("ACTIVE", 6), ("CREATED", 16)],
                |t| {
                    vec![
                        t.id.to_string(),
                        t.subdomain.clone(),
                        t.name.clone(),
                        if t.active { "yes" } else { "no" }.to_string(),
                        t.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    ]
                },
            )
        }
        TenantCommands::Deactivate { subdomain } => set_active(&service, &subdomain, false, output_format).await,
        TenantCommands::Activate { subdomain } => set_active(&service, &subdomain, true, output_format).await,
    }
}

async fn set_active(
    service: &TenantService,
    subdomain: &str,
    active: bool,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let tenant = service.find_by_subdomain(subdomain).await?;
    let tenant = service.set_active(tenant.id, active).await?;
    let verb = if active { "Activated" } else { "Deactivated" };
    output_success(output_format, &format!("{} tenant '{}'", verb, tenant.subdomain), Some(json!(tenant)))
}
