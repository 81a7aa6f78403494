//! Depot server binary

use clap::Parser;
use depot_core::DepotConfig;
use depot_metadata::{ArtifactRepository, PostgresArtifactStore, SqliteArtifactStore};
use depot_s3::S3ClientFactory;
use depot_server::{
    router, AppState, ArtifactManager, JsonTokenParser, StaticWorkspaces, ZenodoFactory,
};
use depot_vector::{EmbeddingRegistry, OpenAiEmbeddings, QdrantVectorStore, VectorStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "depot-server", version, about = "Depot artifact manager")]
struct Args {
    /// Path to a TOML configuration file; environment variables are used
    /// when omitted.
    #[arg(short, long, env = "DEPOT_CONFIG")]
    config: Option<String>,
}

fn init_tracing(config: &DepotConfig) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    if config.logging.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => DepotConfig::from_file(path)?,
        None => DepotConfig::from_env(),
    };
    init_tracing(&config);

    let repo: Arc<dyn ArtifactRepository> = if config.database.url.starts_with("postgres") {
        Arc::new(
            PostgresArtifactStore::connect(&config.database.url, config.database.max_connections)
                .await?,
        )
    } else {
        Arc::new(
            SqliteArtifactStore::connect(&config.database.url, config.database.max_connections)
                .await?,
        )
    };

    let vectors: Option<Arc<dyn VectorStore>> = config.vector.url.as_ref().map(|url| {
        Arc::new(QdrantVectorStore::new(
            url.clone(),
            config.vector.api_key.clone(),
        )) as Arc<dyn VectorStore>
    });
    if vectors.is_some() {
        info!("Vector backend configured");
    }

    let mut embeddings = EmbeddingRegistry::new();
    if let Some(api_key) = &config.embedding.openai_api_key {
        embeddings.register(
            "openai",
            Arc::new(OpenAiEmbeddings::new(
                config.embedding.openai_base_url.clone(),
                api_key.clone(),
            )),
        );
    }

    let manager = Arc::new(ArtifactManager::new(
        repo,
        Arc::new(S3ClientFactory::new()),
        vectors,
        Arc::new(embeddings),
        Arc::new(ZenodoFactory::new()),
        Arc::new(StaticWorkspaces::new(
            config.workspaces.all_persistent,
            config.workspaces.persistent.clone(),
        )),
        config.object_store.clone(),
    ));

    let state = AppState {
        manager,
        tokens: Arc::new(JsonTokenParser),
    };
    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Depot server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
