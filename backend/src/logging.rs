use chrono::Utc;
use chrono_tz::Tz;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, EnvFilter, Layer, Registry};

const DEFAULT_FILTER: &str = "info,sqlx=warn,tower_http=info";

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<String>,
}

impl tracing::field::Visit for EventVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message.push_str(&format!("{:?}", value));
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }
}

/// Console output in wheel-local time, one line per event.
struct ConsoleLayer {
    timezone: Tz,
}

impl<S: Subscriber> Layer<S> for ConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();

        // Query chatter is only interesting when something went wrong
        if metadata.target().starts_with("sqlx") && *metadata.level() > Level::WARN {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let timestamp = Utc::now()
            .with_timezone(&self.timezone)
            .format("%Y-%m-%d %H:%M:%S%.3f")
            .to_string();

        if let Some(line) = format_line(&timestamp, metadata.level(), metadata.target(), &visitor) {
            if *metadata.level() == Level::ERROR {
                eprintln!("{}", line);
            } else {
                println!("{}", line);
            }
        }
    }
}

fn format_line(timestamp: &str, level: &Level, target: &str, visitor: &EventVisitor) -> Option<String> {
    if visitor.message.is_empty() && visitor.fields.is_empty() {
        return None;
    }

    let label = match level.as_str() {
        "ERROR" => "❌ Error:",
        "WARN" => "⚠️ Warning:",
        "INFO" => "ℹ️",
        "DEBUG" => "🔄",
        _ => return None,
    };

    let mut line = format!("[{}] {} {} - {}", timestamp, label, target, visitor.message);
    if !visitor.fields.is_empty() {
        line.push_str(" | ");
        line.push_str(&visitor.fields.join(" "));
    }
    Some(line)
}

pub fn setup(timezone: Tz) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = Registry::default()
        .with(env_filter)
        .with(ConsoleLayer { timezone });

    tracing::subscriber::set_global_default(subscriber)
}
