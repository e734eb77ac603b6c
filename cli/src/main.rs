use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Commands};
use mediashelf::{
    config::API_URL_VAR, ClientConfig, IdentificationWorkflow, IdentifyPhase,
    ItemDetailController, LibraryApi, LibraryEvents, LibraryListController, ListView,
    MetadataRefreshService, QueryState, Result,
};
use shared::{ImageSource, ItemId, SortKey, SortOrder};
use tracing::{debug, error};

mod cli;

/// Shared handles built once at startup and injected into each controller.
struct App {
    api: LibraryApi,
    events: LibraryEvents,
    image_base: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediashelf=debug".to_string()
        } else {
            "mediashelf=warn".to_string()
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Command output goes to stdout, logs and errors to stderr.
    let mut out = Vec::new();
    let result = run(cli, &mut out).await;
    for line in &out {
        println!("{line}");
    }
    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, out: &mut Vec<String>) -> Result<ExitCode> {
    let config = match cli.api_url {
        Some(url) => ClientConfig::from_lookup(|name| {
            if name == API_URL_VAR {
                Some(url.clone())
            } else {
                std::env::var(name).ok()
            }
        })?,
        None => ClientConfig::from_env()?,
    };
    debug!("Using server {}", config.api_url);

    let app = App {
        api: LibraryApi::new(config.transport()?),
        events: LibraryEvents::new(),
        image_base: config.image_base,
    };

    match cli.command {
        Commands::List {
            scope,
            sort,
            order,
            search,
            page,
            limit,
        } => {
            let query = QueryState {
                search: search.unwrap_or_default(),
                sort: sort.map(SortKey::from).unwrap_or_default(),
                order: order.map(SortOrder::from).unwrap_or_default(),
                page,
                limit,
            };
            list(&app, scope.into(), query, out).await
        }
        Commands::Show { id } => show(&app, id, out).await,
        Commands::Refresh { ids } => refresh(&app, &ids, out).await,
        Commands::Identify { id, pick } => identify(&app, id, pick, out).await,
    }
}

async fn list(
    app: &App,
    scope: shared::LibraryScope,
    query: QueryState,
    out: &mut Vec<String>,
) -> Result<ExitCode> {
    let controller =
        LibraryListController::new(app.api.clone(), scope).with_image_base(&app.image_base);
    controller.apply_query(query).await;

    match controller.view() {
        ListView::Failed(e) => return Err(e),
        ListView::NoMatches => out.push("No matches.".to_string()),
        ListView::Items(page) => {
            for card in controller.cards() {
                let year = card.year.map(|y| format!(" ({y})")).unwrap_or_default();
                let rating = card.rating.map(|r| format!("  ★ {r}")).unwrap_or_default();
                let flag = if card.identified { "" } else { "  [unidentified]" };
                out.push(format!("{:>6}  {}{year}{rating}{flag}", card.id, card.title));
            }
            out.push(format!(
                "\nShowing {} of {} items",
                page.items.len(),
                page.total
            ));
        }
        ListView::Idle | ListView::Loading => {}
    }
    Ok(ExitCode::SUCCESS)
}

async fn show(app: &App, id: ItemId, out: &mut Vec<String>) -> Result<ExitCode> {
    let detail =
        ItemDetailController::new(app.api.clone()).with_image_base(&app.image_base);
    let item = detail.mount(id).await.into_result()?;
    print_item(&detail, &item, out);
    Ok(ExitCode::SUCCESS)
}

fn print_item(
    detail: &ItemDetailController,
    item: &shared::MediaItemWithMetadata,
    out: &mut Vec<String>,
) {
    let year = item
        .display_year()
        .map(|y| format!(" ({y})"))
        .unwrap_or_default();
    out.push(format!("{}{year}  [{}]", item.item.title, item.item.media_type));
    out.push(format!(
        "File:     {} ({})",
        item.item.file_path,
        format_size(item.item.file_size)
    ));
    out.push(format!("Added:    {}", item.item.added_at));

    let Some(metadata) = &item.metadata else {
        out.push(format!(
            "\nNot identified yet. Try `mediashelf identify {}`.",
            item.id()
        ));
        return;
    };
    if let Some(runtime) = metadata.runtime_display() {
        out.push(format!("Runtime:  {runtime}"));
    }
    if let Some(rating) = metadata.rating_display() {
        let votes = metadata.vote_count.unwrap_or_default();
        out.push(format!("Rating:   {rating} ({votes} votes)"));
    }
    let genres = metadata.genres();
    if !genres.is_empty() {
        out.push(format!("Genres:   {}", genres.join(", ")));
    }
    if let ImageSource::Remote(url) = detail.poster() {
        out.push(format!("Poster:   {url}"));
    }
    if let Some(overview) = &metadata.overview {
        out.push(format!("\n{overview}"));
    }
}

async fn refresh(app: &App, ids: &[ItemId], out: &mut Vec<String>) -> Result<ExitCode> {
    let service = MetadataRefreshService::new(app.api.clone());

    if let [id] = ids {
        let status = service.refresh_one(*id).await?;
        out.push(format!("{id}: {status}"));
        return Ok(ExitCode::SUCCESS);
    }

    let outcome = service.refresh_batch(ids).await?;
    for id in &outcome.succeeded {
        out.push(format!("{id}: refreshed"));
    }
    for failure in &outcome.failed {
        out.push(format!("{}: failed, {}", failure.id, failure.reason));
    }
    if outcome.is_complete_success() {
        return Ok(ExitCode::SUCCESS);
    }

    let retry: Vec<String> = outcome.failed_ids().iter().map(ItemId::to_string).collect();
    out.push(format!("\nRetry with: mediashelf refresh {}", retry.join(" ")));
    Ok(ExitCode::FAILURE)
}

async fn identify(
    app: &App,
    id: ItemId,
    pick: Option<u32>,
    out: &mut Vec<String>,
) -> Result<ExitCode> {
    let workflow = IdentificationWorkflow::new(app.api.clone(), app.events.clone())
        .with_image_base(&app.image_base);

    let candidates = match workflow.open(id).await? {
        IdentifyPhase::CandidatesReady { candidates, .. } => candidates,
        IdentifyPhase::CandidatesError { error, .. } => return Err(error),
        _ => return Ok(ExitCode::FAILURE),
    };
    if candidates.is_empty() {
        out.push(format!("No candidates found for item {id}."));
        workflow.cancel()?;
        return Ok(ExitCode::SUCCESS);
    }

    for (n, candidate) in candidates.iter().enumerate() {
        let rating = candidate
            .rating
            .map(|r| format!("  ★ {r:.1}"))
            .unwrap_or_default();
        let confidence = candidate
            .confidence
            .as_deref()
            .map(|c| format!("  {c}"))
            .unwrap_or_default();
        out.push(format!(
            "{:>3}. {}  [{} {}:{}]{rating}{confidence}",
            n + 1,
            candidate.label(),
            candidate.media_type,
            candidate.provider,
            candidate.id
        ));
    }

    let Some(pick) = pick else {
        out.push(format!("\nApply one with: mediashelf identify {id} --pick N"));
        workflow.cancel()?;
        return Ok(ExitCode::SUCCESS);
    };
    let Some(candidate) = candidates.get(pick as usize - 1) else {
        eprintln!("--pick {pick} is out of range (1-{})", candidates.len());
        workflow.cancel()?;
        return Ok(ExitCode::FAILURE);
    };

    // Listen before applying so the change notification is not missed.
    let detail =
        ItemDetailController::new(app.api.clone()).with_image_base(&app.image_base);
    detail.navigate(id).await;
    let mut changes = app.events.subscribe();

    match workflow.select(candidate).await? {
        IdentifyPhase::Applied { message, .. } => {
            out.push(String::new());
            out.push(message);
        }
        IdentifyPhase::ApplyError { error, .. } => return Err(error),
        _ => return Ok(ExitCode::FAILURE),
    }

    while let Ok(event) = changes.try_recv() {
        if let Some(attempt) = detail.handle_event(&event).await {
            let item = attempt.into_result()?;
            out.push(String::new());
            print_item(&detail, &item, out);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn format_size(bytes: i64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
