use std::{process, sync::Arc};

use sitehook::{
    application::{
        content::ContentService,
        error::AppError,
        modules::default_dispatcher,
        repos::{ContentsRepo, OptionsRepo, UsersRepo},
        services::AppServices,
        site::SiteService,
    },
    cache::SiteConfigCache,
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, SiteState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;
    telemetry::install_panic_hook(settings.site.debug);

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let services = build_services(repositories, &settings);
    let state = SiteState {
        services,
        dispatcher: Arc::new(default_dispatcher()),
        body_limit: usize::try_from(settings.server.body_limit_bytes.get())
            .map_err(|_| AppError::validation("server.body_limit_bytes exceeds usize"))?,
    };
    serve_http(&settings, state).await
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_services(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Arc<AppServices> {
    let options_repo: Arc<dyn OptionsRepo> = repositories.clone();
    let contents_repo: Arc<dyn ContentsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories;

    let cache = Arc::new(SiteConfigCache::new(settings.site.cache_ttl));
    Arc::new(AppServices {
        sites: Arc::new(SiteService::new(options_repo, cache)),
        content: Arc::new(ContentService::new(contents_repo)),
        users: users_repo,
        debug: settings.site.debug,
    })
}

async fn serve_http(settings: &config::Settings, state: SiteState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "Listening");

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}
