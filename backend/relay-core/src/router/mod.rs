//! Static routing between UI events and broker queues.
//!
//! Outbound rows map a command event coming from a surface to the queue it is
//! published on and the payload written there. Inbound rows map a consumed
//! queue to the surface (and event name) its messages are forwarded to.
//! The table is fixed at compile time; variants only choose which rows apply.

use crate::error::router::RouterError;
use crate::surface::SurfaceId;
use crate::{
    QUEUE_FALCON_ASK, QUEUE_FALCON_AUDIO, QUEUE_FALCON_SCREEN, QUEUE_FALCON_X_WING,
    QUEUE_FALCON_X_WING_AUDIO,
};

use common::ErrorLocation;

use std::panic::Location;

use serde::{Deserialize, Serialize};

pub const EVENT_CLOSE_APP: &str = "close-app";
pub const EVENT_START_RECORD: &str = "start-record";
pub const EVENT_STOP_RECORD: &str = "stop-record";
pub const EVENT_PRINT_SCREEN: &str = "print-screen";
pub const EVENT_USER_TEXT_INPUT: &str = "user-text-input";

pub const EVENT_NEW_MESSAGE: &str = "new-message";
pub const EVENT_NEW_MESSAGE_AUDIO: &str = "new-message-audio";

/// Overlay status shown after `start-record` is published.
pub const ECHO_RECORDING: &str = "🎙️ Gravando...";
/// Overlay status shown after `stop-record` is published.
pub const ECHO_STOPPED: &str = "⏹️ Parado";

/// Event a surface receives in answer to its own `new-message`.
pub const EVENT_REPLY: &str = "resposta";
pub const REPLY_TEXT: &str = const_format::concatcp!("Message received by ", crate::APP_NAME, ".");

pub const START_RECORD: &str = "START_RECORD";
pub const STOP_RECORD: &str = "STOP_RECORD";
pub const PRINT_SCREEN: &str = "PRINT_SCREEN";

const ASK_PROMPT_PREAMBLE: &str = "Help with this problem:\n\n";

/// A command raised by a UI surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
    CloseApp,
    StartRecord,
    StopRecord,
    PrintScreen,
    UserTextInput(String),
    /// Free text a renderer sends up; logged and answered, never published.
    RendererMessage(String),
}

impl CommandEvent {
    /// Build a command from its wire name and optional argument.
    ///
    /// Arguments on commands that take none are ignored. A `new-message`
    /// without text carries an empty string.
    ///
    /// # Errors
    ///
    /// - [`RouterError::UnknownEvent`] for names outside the table
    /// - [`RouterError::MissingPayload`] for `user-text-input` without text
    #[track_caller]
    pub fn parse(name: &str, payload: Option<String>) -> Result<Self, RouterError> {
        match name {
            EVENT_CLOSE_APP => Ok(CommandEvent::CloseApp),
            EVENT_START_RECORD => Ok(CommandEvent::StartRecord),
            EVENT_STOP_RECORD => Ok(CommandEvent::StopRecord),
            EVENT_PRINT_SCREEN => Ok(CommandEvent::PrintScreen),
            EVENT_USER_TEXT_INPUT => payload.map(CommandEvent::UserTextInput).ok_or_else(|| {
                RouterError::MissingPayload {
                    event: name.to_string(),
                    location: ErrorLocation::from(Location::caller()),
                }
            }),
            EVENT_NEW_MESSAGE => Ok(CommandEvent::RendererMessage(payload.unwrap_or_default())),
            _ => Err(RouterError::UnknownEvent {
                event: name.to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CommandEvent::CloseApp => EVENT_CLOSE_APP,
            CommandEvent::StartRecord => EVENT_START_RECORD,
            CommandEvent::StopRecord => EVENT_STOP_RECORD,
            CommandEvent::PrintScreen => EVENT_PRINT_SCREEN,
            CommandEvent::UserTextInput(_) => EVENT_USER_TEXT_INPUT,
            CommandEvent::RendererMessage(_) => EVENT_NEW_MESSAGE,
        }
    }

    pub fn argument(&self) -> Option<&str> {
        match self {
            CommandEvent::UserTextInput(text) | CommandEvent::RendererMessage(text) => {
                Some(text.as_str())
            }
            _ => None,
        }
    }
}

/// How the published payload is derived from a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadTransform {
    /// A fixed keyword; the argument is ignored.
    Literal(&'static str),
    /// The argument wrapped in the assistant prompt preamble.
    Prompt,
}

impl PayloadTransform {
    pub fn apply(&self, argument: Option<&str>) -> String {
        match self {
            PayloadTransform::Literal(keyword) => (*keyword).to_string(),
            PayloadTransform::Prompt => {
                format!("{ASK_PROMPT_PREAMBLE}{}\n", argument.unwrap_or_default())
            }
        }
    }
}

/// Status text shown on a surface right after a command is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalEcho {
    pub surface: SurfaceId,
    pub event: &'static str,
    pub text: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundRoute {
    pub event: &'static str,
    pub queue: &'static str,
    pub transform: PayloadTransform,
    pub echo: Option<LocalEcho>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundRoute {
    pub queue: &'static str,
    pub surface: SurfaceId,
    pub event: &'static str,
}

/// Actions handled inside the process instead of on the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAction {
    Quit,
}

/// Where a command goes and what it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Publish {
        queue: &'static str,
        payload: String,
        echo: Option<LocalEcho>,
    },
    Local(LocalAction),
    /// Answer the sending surface with `event`; nothing is published.
    Reply {
        event: &'static str,
        text: &'static str,
    },
}

const START_RECORD_ROUTE: OutboundRoute = OutboundRoute {
    event: EVENT_START_RECORD,
    queue: QUEUE_FALCON_AUDIO,
    transform: PayloadTransform::Literal(START_RECORD),
    echo: Some(LocalEcho {
        surface: SurfaceId::AudioOverlay,
        event: EVENT_NEW_MESSAGE_AUDIO,
        text: ECHO_RECORDING,
    }),
};

const STOP_RECORD_ROUTE: OutboundRoute = OutboundRoute {
    event: EVENT_STOP_RECORD,
    queue: QUEUE_FALCON_AUDIO,
    transform: PayloadTransform::Literal(STOP_RECORD),
    echo: Some(LocalEcho {
        surface: SurfaceId::AudioOverlay,
        event: EVENT_NEW_MESSAGE_AUDIO,
        text: ECHO_STOPPED,
    }),
};

const PRINT_SCREEN_ROUTE: OutboundRoute = OutboundRoute {
    event: EVENT_PRINT_SCREEN,
    queue: QUEUE_FALCON_SCREEN,
    transform: PayloadTransform::Literal(PRINT_SCREEN),
    echo: None,
};

const USER_TEXT_INPUT_ROUTE: OutboundRoute = OutboundRoute {
    event: EVENT_USER_TEXT_INPUT,
    queue: QUEUE_FALCON_ASK,
    transform: PayloadTransform::Prompt,
    echo: None,
};

static OUTBOUND_ROUTES: [OutboundRoute; 4] = [
    START_RECORD_ROUTE,
    STOP_RECORD_ROUTE,
    PRINT_SCREEN_ROUTE,
    USER_TEXT_INPUT_ROUTE,
];

// The audio overlay row must stay last so the standard variant can slice it off.
static INBOUND_ROUTES: [InboundRoute; 2] = [
    InboundRoute {
        queue: QUEUE_FALCON_X_WING,
        surface: SurfaceId::Main,
        event: EVENT_NEW_MESSAGE,
    },
    InboundRoute {
        queue: QUEUE_FALCON_X_WING_AUDIO,
        surface: SurfaceId::AudioOverlay,
        event: EVENT_NEW_MESSAGE_AUDIO,
    },
];

/// Which rows of the table are active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteVariant {
    /// Control panel only.
    Standard,
    /// Control panel plus the audio status overlay.
    #[default]
    AudioOverlay,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommandRouter {
    variant: RouteVariant,
}

impl CommandRouter {
    pub fn new(variant: RouteVariant) -> Self {
        Self { variant }
    }

    pub fn variant(&self) -> RouteVariant {
        self.variant
    }

    pub fn inbound_routes(&self) -> &'static [InboundRoute] {
        match self.variant {
            RouteVariant::Standard => &INBOUND_ROUTES[..1],
            RouteVariant::AudioOverlay => &INBOUND_ROUTES,
        }
    }

    pub fn outbound_routes(&self) -> &'static [OutboundRoute] {
        &OUTBOUND_ROUTES
    }

    pub fn inbound_route(&self, queue: &str) -> Option<&'static InboundRoute> {
        self.inbound_routes()
            .iter()
            .find(|route| route.queue == queue)
    }

    /// Every queue this variant touches, inbound first, without duplicates.
    pub fn queues(&self) -> Vec<&'static str> {
        let mut queues: Vec<&'static str> = Vec::new();
        let inbound = self.inbound_routes().iter().map(|route| route.queue);
        let outbound = self.outbound_routes().iter().map(|route| route.queue);

        for queue in inbound.chain(outbound) {
            if !queues.contains(&queue) {
                queues.push(queue);
            }
        }

        queues
    }

    /// Resolve a command to its publish target or local action.
    pub fn resolve(&self, event: &CommandEvent) -> Resolution {
        let route = match event {
            CommandEvent::CloseApp => return Resolution::Local(LocalAction::Quit),
            CommandEvent::RendererMessage(_) => {
                return Resolution::Reply {
                    event: EVENT_REPLY,
                    text: REPLY_TEXT,
                };
            }
            CommandEvent::StartRecord => START_RECORD_ROUTE,
            CommandEvent::StopRecord => STOP_RECORD_ROUTE,
            CommandEvent::PrintScreen => PRINT_SCREEN_ROUTE,
            CommandEvent::UserTextInput(_) => USER_TEXT_INPUT_ROUTE,
        };

        let echo = match self.variant {
            RouteVariant::Standard => None,
            RouteVariant::AudioOverlay => route.echo,
        };

        Resolution::Publish {
            queue: route.queue,
            payload: route.transform.apply(event.argument()),
            echo,
        }
    }
}
