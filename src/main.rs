use iced::{Element, Subscription, Task, Theme};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod camera;
mod config;
mod platform;
mod qr;
mod routes;
mod state;
mod ui;

#[cfg(test)]
mod testing;

use config::AppConfig;
use platform::Platform;
use routes::{Resolution, Route};
use state::data::FacingMode;
use state::session::SessionContext;
use ui::capture::{CaptureMessage, CaptureScreen};
use ui::login::{LoginAction, LoginForm, LoginMessage};

/// Main application state
struct CaptureMeter {
    /// Username written at login, read at submission
    identity: SessionContext,
    platform: Platform,
    default_facing: FacingMode,
    route: Route,
    login: LoginForm,
    /// Mounted only while on the home route
    capture: Option<CaptureScreen>,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    Login(LoginMessage),
    Capture(CaptureMessage),
}

impl CaptureMeter {
    fn new(config: AppConfig) -> (Self, Task<Message>) {
        let platform = Platform::from_config(&config);
        let app = CaptureMeter {
            identity: config.session_context(),
            platform,
            default_facing: config.default_facing,
            route: Route::Login,
            login: LoginForm::new(),
            capture: None,
        };
        app.open(&config.start_path)
    }

    /// Resolve the start path and mount the matching screen
    fn open(mut self, path: &str) -> (Self, Task<Message>) {
        let route = match routes::resolve(path) {
            Resolution::Page(route) => route,
            Resolution::Redirect(route) => {
                tracing::debug!("{} redirects to {}", path, route.path());
                route
            }
            Resolution::NotFound => {
                tracing::warn!("No page at {}, showing login", path);
                Route::Login
            }
        };
        let task = self.navigate(route);
        (self, task)
    }

    fn navigate(&mut self, route: Route) -> Task<Message> {
        tracing::info!("Navigating to {}", route.path());
        self.route = route;

        // Unmount first so the previous screen releases the camera
        self.capture = None;

        match route {
            Route::Login => Task::none(),
            Route::Home => {
                let (screen, task) = CaptureScreen::new(self.platform.clone(), self.default_facing);
                self.capture = Some(screen);
                task.map(Message::Capture)
            }
        }
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Login(message) => match self.login.update(message, &self.identity) {
                LoginAction::Navigate(route) => self.navigate(route),
                LoginAction::None => Task::none(),
            },
            Message::Capture(message) => match self.capture.as_mut() {
                Some(screen) => screen.update(message, &self.identity).map(Message::Capture),
                // Late result for a screen that is gone
                None => Task::none(),
            },
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        match (self.route, &self.capture) {
            (Route::Home, Some(screen)) => screen.view().map(Message::Capture),
            _ => self.login.view().map(Message::Login),
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        match &self.capture {
            Some(screen) => screen.subscription().map(Message::Capture),
            None => Subscription::none(),
        }
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "capture_meter=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> iced::Result {
    init_logging();

    let config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!("{}, using defaults", e);
        AppConfig::default()
    });

    iced::application("Capture Meter", CaptureMeter::update, CaptureMeter::view)
        .subscription(CaptureMeter::subscription)
        .theme(CaptureMeter::theme)
        .centered()
        .run_with(move || CaptureMeter::new(config))
}
