/// Login screen
///
/// Collects a username and password. Only the username is kept; it goes to
/// the session context and the app moves on to the capture screen.

use iced::widget::{button, column, container, text, text_input};
use iced::{Alignment, Element, Length};

use crate::routes::Route;
use crate::state::session::SessionContext;

#[derive(Debug, Clone)]
pub enum LoginMessage {
    UsernameChanged(String),
    PasswordChanged(String),
    Submit,
}

/// What the shell should do after a login update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginAction {
    None,
    Navigate(Route),
}

#[derive(Debug, Default)]
pub struct LoginForm {
    username: String,
    password: String,
}

impl LoginForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both fields are required
    pub fn can_submit(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    pub fn update(&mut self, message: LoginMessage, session: &SessionContext) -> LoginAction {
        match message {
            LoginMessage::UsernameChanged(username) => {
                self.username = username;
                LoginAction::None
            }
            LoginMessage::PasswordChanged(password) => {
                self.password = password;
                LoginAction::None
            }
            LoginMessage::Submit => {
                if !self.can_submit() {
                    return LoginAction::None;
                }

                session.write_username(&self.username);
                self.password.clear();
                tracing::info!(username = %self.username, "Logged in");
                LoginAction::Navigate(Route::Home)
            }
        }
    }

    pub fn view(&self) -> Element<LoginMessage> {
        let submit = self.can_submit().then_some(LoginMessage::Submit);

        let form = column![
            text("Sign in").size(32),
            text_input("Username", &self.username)
                .on_input(LoginMessage::UsernameChanged)
                .on_submit(LoginMessage::Submit)
                .padding(10),
            text_input("Password", &self.password)
                .on_input(LoginMessage::PasswordChanged)
                .on_submit(LoginMessage::Submit)
                .secure(true)
                .padding(10),
            button("Login").on_press_maybe(submit).padding(10),
        ]
        .spacing(16)
        .width(Length::Fixed(320.0))
        .align_x(Alignment::Center);

        container(form)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into()
    }
}
