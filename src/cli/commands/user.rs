use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_empty_collection, output_success, output_table};
use crate::cli::OutputFormat;
use crate::services::user_service::ListUsersQuery;
use crate::services::{TenantService, UserService};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Grant the ADMIN role to a user")]
    Promote {
        #[arg(help = "Tenant subdomain")]
        tenant: String,
        #[arg(help = "User email")]
        email: String,
    },

    #[command(about = "List users in a tenant")]
    List {
        #[arg(help = "Tenant subdomain")]
        tenant: String,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 50)]
        page_size: i64,
    },
}

pub async fn handle(cmd: UserCommands, state: &AppState, output_format: OutputFormat) -> anyhow::Result<()> {
    let tenants = TenantService::new(state);
    let users = UserService::new(state);

    match cmd {
        UserCommands::Promote { tenant, email } => {
            let tenant = tenants.find_by_subdomain(&tenant).await?;
            let user = users.promote_by_email(tenant.id, &email).await?;
            output_success(
                output_format,
                &format!("{} is now an ADMIN of '{}'", user.email, tenant.subdomain),
                Some(json!(user)),
            )
        }
        UserCommands::List { tenant, page, page_size } => {
            let tenant = tenants.find_by_subdomain(&tenant).await?;
            let query = ListUsersQuery { page: Some(page), page_size: Some(page_size), ..Default::default() };
            let result = users.list(tenant.id, query).await?;
            if result.data.is_empty() {
                return output_empty_collection(output_format, "users", "No users found");
            }
            output_table(
                output_format,
                "users",
                &result.data,
                &[("ID", 36), ("EMAIL", 32), ("NAME", 24), ("ROLE", 6), ("ACTIVE", 6)],
                |u| {
                    vec![
                        u.id.to_string(),
                        u.email.clone(),
                        u.name.clone(),
                        u.role.to_string(),
                        if u.active { "yes" } else { "no" }.to_string(),
                    ]
                },
            )
        }
    }
}
