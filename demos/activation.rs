//! Example walking through service activation, scopes, and disposal
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example activation --features logging-pretty
//! ```
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example activation --features logging-json
//! ```

use dependency_activator::prelude::*;

trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}

struct Formal;

impl Greeter for Formal {
    fn greet(&self, name: &str) -> String {
        format!("Good day, {name}.")
    }
}

struct Casual;

impl Greeter for Casual {
    fn greet(&self, name: &str) -> String {
        format!("hey {name}")
    }
}

struct Database {
    url: String,
}

struct RequestContext {
    request_id: u64,
}

impl Dispose for RequestContext {
    fn dispose(&self) {
        println!("  [App] Request {} disposed", self.request_id);
    }
}

struct Repository {
    entity: String,
}

fn greeter<G: Greeter + 'static>(greeter: fn() -> G) -> Implementation {
    Implementation::new(ServiceType::of::<G>()).constructor(Constructor::parameterless(move |_| {
        Ok(Instance::from_arc(Arc::new(greeter()) as Arc<dyn Greeter>))
    }))
}

fn main() -> Result<()> {
    // Initialize logging - uses JSON if logging-json feature enabled,
    // pretty if logging-pretty enabled
    #[cfg(feature = "logging")]
    {
        dependency_activator::logging::init();
    }

    println!("=== Dependency Activator Demo ===\n");

    let requests = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let counter = Arc::clone(&requests);

    let repository = ServiceType::generic_definition("Repository", 1);
    let definition = repository.clone();
    let open_repository = Implementation::generic_definition(repository.clone(), move |args| {
        let entity = args[0].to_string();
        Some(
            Implementation::new(definition.close(args.to_vec())).constructor(
                Constructor::parameterless(move |_| {
                    Ok(Instance::new(Repository {
                        entity: entity.clone(),
                    }))
                }),
            ),
        )
    });

    // Building logs: "Building DI container"
    let container = Container::build_with_options(
        [
            ServiceDescriptor::instance(
                ServiceType::of::<Database>(),
                Instance::new(Database {
                    url: "postgres://localhost/app".into(),
                }),
            ),
            ServiceDescriptor::singleton(ServiceType::of::<dyn Greeter>(), greeter(|| Formal)),
            ServiceDescriptor::singleton(ServiceType::of::<dyn Greeter>(), greeter(|| Casual)),
            ServiceDescriptor::factory(
                ServiceType::of::<RequestContext>(),
                Lifetime::Scoped,
                move |_| {
                    let request_id =
                        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                    Ok(Instance::disposable(RequestContext { request_id }))
                },
            ),
            ServiceDescriptor::scoped(repository.clone(), open_repository),
        ],
        ContainerOptions::new()
            .with_scope_validation(true)
            .with_build_validation(true),
    )?;

    println!("1. Instance registration");
    let db = container.get::<Database>()?;
    println!("   Database: {}\n", db.url);

    println!("2. Last registration wins, collections keep order");
    println!("   {}", container.get::<dyn Greeter>()?.greet("Ada"));
    for greeter in container.get_all::<dyn Greeter>()? {
        println!("   - {}", greeter.greet("Ada"));
    }
    println!();

    println!("3. Scoped services, one instance per scope");
    for _ in 0..2 {
        // Logs: "Created scope" / "Disposed scope"
        let scope = container.create_scope();
        let first = scope.get::<RequestContext>()?;
        let second = scope.get::<RequestContext>()?;
        println!(
            "   Scope {}: request {} (same instance: {})",
            scope.id(),
            first.request_id,
            Arc::ptr_eq(&first, &second)
        );
    }
    println!();

    println!("4. Scope validation");
    match container.get::<RequestContext>() {
        Ok(_) => println!("   unexpected success"),
        Err(err) => println!("   Error: {err}"),
    }
    println!();

    println!("5. Open generics");
    let scope = container.create_scope();
    for entity in ["User", "Order"] {
        let closed = repository.close([ServiceType::named(entity)]);
        let instance = scope.resolve(&closed)?;
        if let Some(repository) = instance.downcast::<Repository>() {
            println!("   {closed} -> Repository for {}", repository.entity);
        }
    }
    println!();

    println!("6. Missing services");
    match container.resolve(&ServiceType::named("IMailer")) {
        Ok(_) => println!("   unexpected success"),
        Err(err) => println!("   Error: {err}"),
    }
    println!(
        "   try_resolve: {:?}",
        container.try_resolve(&ServiceType::named("IMailer"))?.is_none()
    );

    println!("\n=== Demo Complete ===");
    println!("   Requests served: {}", requests.load(std::sync::atomic::Ordering::SeqCst));
    Ok(())
}
