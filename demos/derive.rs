//! Example demonstrating the #[derive(Injectable)] macro
//!
//! Run with:
//!   cargo run --example derive --features derive

use dependency_activator::prelude::*;
use dependency_activator::Injectable;

// Dependencies
#[derive(Injectable)]
struct Database;

impl Database {
    fn url(&self) -> &'static str {
        "postgres://localhost:5432/myapp"
    }
}

#[allow(dead_code)]
struct Logger {
    level: String,
}

trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;
}

#[derive(Injectable)]
#[injectable(expose = dyn Plugin)]
struct AuditPlugin;

impl Plugin for AuditPlugin {
    fn name(&self) -> &'static str {
        "audit"
    }
}

#[derive(Injectable)]
#[injectable(expose = dyn Plugin)]
struct RateLimitPlugin;

impl Plugin for RateLimitPlugin {
    fn name(&self) -> &'static str {
        "rate-limit"
    }
}

// Service with injected dependencies
#[derive(Injectable)]
#[injectable(dispose)]
struct UserService {
    #[inject]
    db: Arc<Database>,
    #[inject(optional)]
    logger: Option<Arc<Logger>>,
    #[inject(all)]
    plugins: Vec<Arc<dyn Plugin>>,
    // Non-injected field uses Default
    request_count: u64,
}

impl UserService {
    fn describe(&self) -> String {
        let logger_status = if self.logger.is_some() {
            "with logging"
        } else {
            "without logging"
        };
        let plugins: Vec<_> = self.plugins.iter().map(|p| p.name()).collect();
        format!(
            "UserService connected to {} ({}, plugins: {:?}, requests: {})",
            self.db.url(),
            logger_status,
            plugins,
            self.request_count
        )
    }
}

impl Dispose for UserService {
    fn dispose(&self) {
        println!("  UserService released with its scope");
    }
}

// Nested injection example
#[derive(Injectable)]
struct ApiController {
    #[inject]
    user_service: Arc<UserService>,
}

fn main() -> Result<()> {
    println!("=== Dependency Activator Derive Macro Demo ===\n");

    // Logger is NOT registered, so it will be None
    let container = Container::build([
        descriptor!(singleton Database),
        descriptor!(singleton dyn Plugin => AuditPlugin),
        descriptor!(singleton dyn Plugin => RateLimitPlugin),
        descriptor!(scoped UserService),
        descriptor!(transient ApiController),
    ])?;

    {
        let scope = container.create_scope();

        println!("Resolving ApiController in {}...", scope.id());
        let controller = scope.get::<ApiController>()?;
        println!("  {}", controller.user_service.describe());

        let again = scope.get::<ApiController>()?;
        println!(
            "  Controllers share the scoped UserService: {}",
            Arc::ptr_eq(&controller.user_service, &again.user_service)
        );
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
