//! Revision Sync
//!
//! Loads today's revision lists from the backend and prints what is due.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use revision_sync::{
    Config, GroupingMode, HttpBackend, ListKind, RefreshBus, RevisionBackend, RevisionList,
    RevisionListController, StatisticsView, TopicListView, TopicScope,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Revision Sync");
    tracing::info!("Backend: {}", config.api_base_url);

    if config.auth_token.is_none() {
        tracing::warn!("No access token configured (SRS_AUTH_TOKEN). Requests will be anonymous!");
    }

    let backend: Arc<dyn RevisionBackend> = Arc::new(HttpBackend::new(&config)?);
    let bus = RefreshBus::new();

    let controllers = [
        RevisionListController::for_backend(
            backend.clone(),
            ListKind::Today,
            GroupingMode::GroupedByTopic,
        ),
        RevisionListController::for_backend(backend.clone(), ListKind::Missed, GroupingMode::Flat),
        RevisionListController::for_backend(
            backend.clone(),
            ListKind::CompletedToday,
            GroupingMode::GroupedByTopic,
        ),
        RevisionListController::for_backend(
            backend.clone(),
            ListKind::Schedule,
            GroupingMode::Flat,
        ),
    ];
    let stats = StatisticsView::new(backend.clone());
    let topic_views = [
        TopicListView::new(backend.clone(), TopicScope::All),
        TopicListView::new(backend.clone(), TopicScope::CreatedToday),
    ];

    for controller in &controllers {
        controller.attach(&bus);
    }
    stats.attach(&bus);
    for view in &topic_views {
        view.attach(&bus);
    }

    // Initial load; each list reports its own failure
    for controller in &controllers {
        match controller.load().await {
            Ok(list) => print_list(controller.kind(), &list),
            Err(e) => println!("{:<10} unavailable ({})", controller.kind(), e),
        }
    }

    for view in &topic_views {
        match view.load().await {
            Ok(topics) => println!("{:<14} {}", view.scope(), topics.len()),
            Err(e) => println!("{:<14} unavailable ({})", view.scope(), e),
        }
    }

    match stats.load().await {
        Ok(Some(s)) => println!(
            "{} topics, {} of {} revisions done ({}%), {} due today",
            s.total_topics,
            s.completed_revisions,
            s.total_revisions,
            s.completion_rate(),
            s.revisions_today
        ),
        Ok(None) => {}
        Err(e) => println!("statistics unavailable ({})", e),
    }

    bus.shutdown();
    Ok(())
}

fn print_list(kind: ListKind, list: &RevisionList) {
    match list {
        RevisionList::Flat(items) => {
            let pending = list.pending().len();
            println!("{:<10} {} revisions, {} pending", kind, items.len(), pending);
        }
        RevisionList::Grouped {
            topic_revisions,
            groups,
        } => {
            println!(
                "{:<10} {} revisions: {} topics, flashcards in {} topics",
                kind,
                list.len(),
                topic_revisions.len(),
                groups.len()
            );
            for item in topic_revisions {
                println!("  {} (day {})", item.topic.title, item.day_number);
            }
            for group in groups {
                println!("  {} ({})", group.topic.title, group.flashcard_count);
            }
        }
    }
}
