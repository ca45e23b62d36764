//! Session shell: owns the endpoint and the health monitor for the whole
//! session and switches between the home view and the chat view. Entering
//! chat creates a fresh transcript; leaving it discards the transcript.

use std::time::Duration;

use crate::client::{http_client, Client, ClientError};
use crate::config::{Config, Endpoint};
use crate::exchange::ExchangeController;
use crate::health::{HealthMonitor, HealthReport};

pub enum View {
    Home,
    Chat(ExchangeController),
}

pub struct App {
    endpoint: Endpoint,
    http: reqwest::Client,
    top_k: u32,
    monitor: HealthMonitor,
    view: View,
}

impl App {
    pub fn new(endpoint: Endpoint, config: &Config) -> Result<Self, ClientError> {
        Self::with_settings(endpoint, config.health_interval(), config.top_k())
    }

    pub fn with_settings(
        endpoint: Endpoint,
        health_interval: Duration,
        top_k: u32,
    ) -> Result<Self, ClientError> {
        let http = http_client()?;
        Ok(Self {
            endpoint,
            monitor: HealthMonitor::new(http.clone(), health_interval),
            http,
            top_k,
            view: View::Home,
        })
    }

    /// Start health polling. Must be called from within a Tokio runtime.
    pub fn mount(&mut self) {
        self.monitor.start(self.endpoint.clone());
    }

    /// Stop health polling and drop any open chat.
    pub fn unmount(&mut self) {
        self.monitor.stop();
        self.view = View::Home;
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn health(&self) -> HealthReport {
        self.monitor.current()
    }

    pub fn monitor(&self) -> &HealthMonitor {
        &self.monitor
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    /// Switch to chat, reusing the current chat if already there.
    pub fn enter_chat(&mut self) -> ExchangeController {
        if let View::Chat(chat) = &self.view {
            return chat.clone();
        }
        let client = Client::new(self.http.clone(), self.endpoint.clone());
        let chat = ExchangeController::new(client, self.top_k);
        self.view = View::Chat(chat.clone());
        tracing::debug!("entered chat view");
        chat
    }

    /// Back to home; the transcript is discarded.
    pub fn leave_chat(&mut self) {
        if matches!(self.view, View::Chat(_)) {
            tracing::debug!("left chat view");
        }
        self.view = View::Home;
    }

    pub fn chat(&self) -> Option<&ExchangeController> {
        match &self.view {
            View::Chat(chat) => Some(chat),
            View::Home => None,
        }
    }
}
