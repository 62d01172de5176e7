use std::{process, sync::Arc};

use qanda::{
    application::{
        error::AppError,
        pagination::PageLimits,
        questions::QuestionService,
        repos::{QuestionsRepo, QuestionsWriteRepo},
    },
    cache::{CacheConfig, QuestionCache},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState},
        telemetry,
    },
};
use tokio::{sync::Notify, task::JoinError};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
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
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_api_state(repositories, &settings);
    serve_http(&settings, state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_repositories(&settings).await?;
    info!(target = "qanda::migrate", "Migrations applied");
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::database)?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    let repositories = PostgresRepositories::new(pool);
    repositories
        .health_check()
        .await
        .map_err(InfraError::database)?;

    Ok(Arc::new(repositories))
}

fn build_api_state(repositories: Arc<PostgresRepositories>, settings: &config::Settings) -> ApiState {
    let questions_repo: Arc<dyn QuestionsRepo> = repositories.clone();
    let questions_write_repo: Arc<dyn QuestionsWriteRepo> = repositories;

    let cache_config = CacheConfig::from(&settings.cache);
    let cache = cache_config
        .is_enabled()
        .then(|| Arc::new(QuestionCache::new(&cache_config)));

    info!(
        target = "qanda::serve",
        cache_enabled = cache.is_some(),
        question_limit = cache_config.question_limit,
        "Question cache configured"
    );

    ApiState {
        questions: Arc::new(QuestionService::new(
            questions_repo,
            questions_write_repo,
            cache,
        )),
        page_limits: PageLimits {
            default_page_size: settings.pagination.default_page_size.get(),
            max_page_size: settings.pagination.max_page_size.get(),
        },
    }
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(target = "qanda::serve", addr = %settings.server.addr, "Listening");

    let shutdown = Arc::new(Notify::new());
    let server_shutdown = Arc::clone(&shutdown);
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move { server_shutdown.notified().await })
            .await
    });

    tokio::select! {
        joined = &mut server => return finish_server(joined),
        () = shutdown_signal() => {}
    }

    info!(
        target = "qanda::serve",
        timeout_secs = settings.server.graceful_shutdown.as_secs(),
        "Shutdown requested, draining connections"
    );
    shutdown.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => finish_server(joined),
        Err(_) => {
            warn!(
                target = "qanda::serve",
                "Graceful shutdown timed out, dropping open connections"
            );
            server.abort();
            Ok(())
        }
    }
}

fn finish_server(joined: Result<std::io::Result<()>, JoinError>) -> Result<(), AppError> {
    match joined {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
