// Unit tests for the routing table
// Tests event parsing, payload transforms, variants and queue sets

use crate::error::router::RouterError;
use crate::router::{
    CommandEvent, CommandRouter, ECHO_RECORDING, ECHO_STOPPED, EVENT_NEW_MESSAGE,
    EVENT_NEW_MESSAGE_AUDIO, EVENT_REPLY, LocalAction, REPLY_TEXT, Resolution, RouteVariant,
};
use crate::surface::SurfaceId;
use crate::{
    QUEUE_FALCON_ASK, QUEUE_FALCON_AUDIO, QUEUE_FALCON_SCREEN, QUEUE_FALCON_X_WING,
    QUEUE_FALCON_X_WING_AUDIO,
};

// ============================================
// PARSING
// ============================================

/// **VALUE**: Verifies every wire name maps to its command.
///
/// **WHY THIS MATTERS**: Renderers send plain strings. A typo in the table
/// silently turns a button into a no-op.
///
/// **BUG THIS CATCHES**: Would catch a renamed or dropped event constant.
#[test]
fn given_known_names_when_parse_then_returns_matching_command() {
    assert_eq!(
        CommandEvent::parse("close-app", None).unwrap(),
        CommandEvent::CloseApp
    );
    assert_eq!(
        CommandEvent::parse("start-record", None).unwrap(),
        CommandEvent::StartRecord
    );
    assert_eq!(
        CommandEvent::parse("stop-record", None).unwrap(),
        CommandEvent::StopRecord
    );
    assert_eq!(
        CommandEvent::parse("print-screen", None).unwrap(),
        CommandEvent::PrintScreen
    );
    assert_eq!(
        CommandEvent::parse("user-text-input", Some(String::from("hi"))).unwrap(),
        CommandEvent::UserTextInput(String::from("hi"))
    );
}

/// **VALUE**: Verifies unknown names are rejected with the offending name.
///
/// **BUG THIS CATCHES**: Would catch a catch-all arm that publishes unknown
/// events somewhere.
#[test]
fn given_unknown_name_when_parse_then_returns_unknown_event() {
    let err = CommandEvent::parse("self-destruct", None).unwrap_err();

    match err {
        RouterError::UnknownEvent { event, .. } => assert_eq!(event, "self-destruct"),
        other => panic!("Expected UnknownEvent, got {other:?}"),
    }
}

/// **VALUE**: Verifies text input without text is refused.
///
/// **WHY THIS MATTERS**: Publishing a prompt with nothing in it wastes an
/// assistant call and hides a renderer bug.
///
/// **BUG THIS CATCHES**: Would catch defaulting a missing payload to "".
#[test]
fn given_user_text_input_without_payload_when_parse_then_returns_missing_payload() {
    let err = CommandEvent::parse("user-text-input", None).unwrap_err();

    assert!(matches!(err, RouterError::MissingPayload { .. }));
}

/// **VALUE**: Verifies arguments on argument-less commands are ignored.
#[test]
fn given_payload_on_start_record_when_parse_then_payload_is_ignored() {
    let event = CommandEvent::parse("start-record", Some(String::from("junk"))).unwrap();

    assert_eq!(event, CommandEvent::StartRecord);
    assert_eq!(event.name(), "start-record");
}

// ============================================
// RESOLUTION
// ============================================

/// **VALUE**: Verifies recorder commands publish their fixed keywords.
///
/// **WHY THIS MATTERS**: The recorder agent matches on the exact strings
/// `START_RECORD` and `STOP_RECORD`.
///
/// **BUG THIS CATCHES**: Would catch a payload change or a wrong queue.
#[test]
fn given_record_commands_when_resolve_then_publishes_keywords_to_audio_queue() {
    let router = CommandRouter::new(RouteVariant::Standard);

    assert_eq!(
        router.resolve(&CommandEvent::StartRecord),
        Resolution::Publish {
            queue: QUEUE_FALCON_AUDIO,
            payload: String::from("START_RECORD"),
            echo: None,
        }
    );
    assert_eq!(
        router.resolve(&CommandEvent::StopRecord),
        Resolution::Publish {
            queue: QUEUE_FALCON_AUDIO,
            payload: String::from("STOP_RECORD"),
            echo: None,
        }
    );
}

/// **VALUE**: Verifies the screenshot trigger.
#[test]
fn given_print_screen_when_resolve_then_publishes_to_screen_queue() {
    let router = CommandRouter::default();

    match router.resolve(&CommandEvent::PrintScreen) {
        Resolution::Publish { queue, payload, .. } => {
            assert_eq!(queue, QUEUE_FALCON_SCREEN);
            assert_eq!(payload, "PRINT_SCREEN");
        }
        other => panic!("Expected Publish, got {other:?}"),
    }
}

/// **VALUE**: Verifies user text is wrapped in the assistant prompt.
///
/// **WHY THIS MATTERS**: The assistant agent forwards the payload verbatim to
/// the model; the preamble and trailing newline are part of the contract.
///
/// **BUG THIS CATCHES**: Would catch a missing blank line or trailing newline.
#[test]
fn given_user_text_when_resolve_then_wraps_in_prompt() {
    let router = CommandRouter::default();
    let event = CommandEvent::UserTextInput(String::from("What is 2+2?"));

    match router.resolve(&event) {
        Resolution::Publish { queue, payload, .. } => {
            assert_eq!(queue, QUEUE_FALCON_ASK);
            assert_eq!(payload, "Help with this problem:\n\nWhat is 2+2?\n");
        }
        other => panic!("Expected Publish, got {other:?}"),
    }
}

/// **VALUE**: Verifies empty text still produces a well-formed prompt.
#[test]
fn given_empty_user_text_when_resolve_then_prompt_has_empty_body() {
    let router = CommandRouter::default();

    match router.resolve(&CommandEvent::UserTextInput(String::new())) {
        Resolution::Publish { payload, .. } => {
            assert_eq!(payload, "Help with this problem:\n\n\n");
        }
        other => panic!("Expected Publish, got {other:?}"),
    }
}

/// **VALUE**: Verifies close-app never reaches the broker.
///
/// **BUG THIS CATCHES**: Would catch close-app being routed to a queue.
#[test]
fn given_close_app_when_resolve_then_returns_local_quit() {
    for variant in [RouteVariant::Standard, RouteVariant::AudioOverlay] {
        let router = CommandRouter::new(variant);
        assert_eq!(
            router.resolve(&CommandEvent::CloseApp),
            Resolution::Local(LocalAction::Quit)
        );
    }
}

/// **VALUE**: Verifies a renderer's own `new-message` is answered, not published.
///
/// **WHY THIS MATTERS**: The control panel uses it as a ping; sending it to a
/// queue would feed renderer chatter to the agents.
///
/// **BUG THIS CATCHES**: Would catch `new-message` being rejected as unknown or
/// routed to a queue.
#[test]
fn given_renderer_message_when_parse_and_resolve_then_replies_locally() {
    let event = CommandEvent::parse(EVENT_NEW_MESSAGE, Some(String::from("ping"))).unwrap();
    let router = CommandRouter::new(RouteVariant::Standard);

    assert_eq!(event, CommandEvent::RendererMessage(String::from("ping")));
    assert_eq!(event.name(), EVENT_NEW_MESSAGE);
    assert_eq!(
        router.resolve(&event),
        Resolution::Reply {
            event: EVENT_REPLY,
            text: REPLY_TEXT,
        }
    );
    assert_eq!(REPLY_TEXT, "Message received by x-wing.");
}

#[test]
fn given_renderer_message_without_text_when_parse_then_empty_text() {
    assert_eq!(
        CommandEvent::parse(EVENT_NEW_MESSAGE, None).unwrap(),
        CommandEvent::RendererMessage(String::new())
    );
}

/// **VALUE**: Verifies the audio overlay variant echoes recorder state locally.
///
/// **WHY THIS MATTERS**: The overlay shows "Gravando..." immediately, before
/// the recorder agent has replied.
///
/// **BUG THIS CATCHES**: Would catch the echo leaking into the standard variant
/// or pointing at the wrong surface.
#[test]
fn given_audio_variant_when_resolve_record_then_includes_overlay_echo() {
    let router = CommandRouter::new(RouteVariant::AudioOverlay);

    match router.resolve(&CommandEvent::StartRecord) {
        Resolution::Publish {
            echo: Some(echo), ..
        } => {
            assert_eq!(echo.surface, SurfaceId::AudioOverlay);
            assert_eq!(echo.event, EVENT_NEW_MESSAGE_AUDIO);
            assert_eq!(echo.text, ECHO_RECORDING);
        }
        other => panic!("Expected Publish with echo, got {other:?}"),
    }

    match router.resolve(&CommandEvent::StopRecord) {
        Resolution::Publish {
            echo: Some(echo), ..
        } => assert_eq!(echo.text, ECHO_STOPPED),
        other => panic!("Expected Publish with echo, got {other:?}"),
    }

    match router.resolve(&CommandEvent::PrintScreen) {
        Resolution::Publish { echo, .. } => assert_eq!(echo, None),
        other => panic!("Expected Publish, got {other:?}"),
    }
}

// ============================================
// VARIANTS AND QUEUES
// ============================================

/// **VALUE**: Verifies which inbound queues each variant consumes.
///
/// **BUG THIS CATCHES**: Would catch the standard variant consuming the audio
/// queue and stealing messages from an overlay process.
#[test]
fn given_variants_when_inbound_routes_then_audio_queue_only_in_overlay_variant() {
    let standard = CommandRouter::new(RouteVariant::Standard);
    let overlay = CommandRouter::new(RouteVariant::AudioOverlay);

    let standard_queues: Vec<_> = standard.inbound_routes().iter().map(|r| r.queue).collect();
    let overlay_queues: Vec<_> = overlay.inbound_routes().iter().map(|r| r.queue).collect();

    assert_eq!(standard_queues, vec![QUEUE_FALCON_X_WING]);
    assert_eq!(
        overlay_queues,
        vec![QUEUE_FALCON_X_WING, QUEUE_FALCON_X_WING_AUDIO]
    );
}

/// **VALUE**: Verifies inbound rows point at the right surfaces and events.
#[test]
fn given_overlay_variant_when_inbound_route_then_maps_queue_to_surface() {
    let router = CommandRouter::new(RouteVariant::AudioOverlay);

    let main = router.inbound_route(QUEUE_FALCON_X_WING).unwrap();
    assert_eq!(main.surface, SurfaceId::Main);
    assert_eq!(main.event, EVENT_NEW_MESSAGE);

    let audio = router.inbound_route(QUEUE_FALCON_X_WING_AUDIO).unwrap();
    assert_eq!(audio.surface, SurfaceId::AudioOverlay);
    assert_eq!(audio.event, EVENT_NEW_MESSAGE_AUDIO);

    assert!(router.inbound_route(QUEUE_FALCON_ASK).is_none());
}

/// **VALUE**: Verifies the declared queue set is complete and duplicate free.
///
/// **WHY THIS MATTERS**: Every queue must exist before the agents publish to it.
///
/// **BUG THIS CATCHES**: Would catch QUEUE_FALCON_AUDIO being declared twice
/// (two outbound rows share it) or a queue being left out.
#[test]
fn given_overlay_variant_when_queues_then_lists_all_five_once() {
    let queues = CommandRouter::new(RouteVariant::AudioOverlay).queues();

    assert_eq!(
        queues,
        vec![
            QUEUE_FALCON_X_WING,
            QUEUE_FALCON_X_WING_AUDIO,
            QUEUE_FALCON_AUDIO,
            QUEUE_FALCON_SCREEN,
            QUEUE_FALCON_ASK,
        ]
    );
}

#[test]
fn given_standard_variant_when_queues_then_omits_audio_inbound_queue() {
    let queues = CommandRouter::new(RouteVariant::Standard).queues();

    assert_eq!(queues.len(), 4);
    assert!(!queues.contains(&QUEUE_FALCON_X_WING_AUDIO));
}
