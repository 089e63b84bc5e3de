use clap::Parser;
use client::game::ClientGameState;
use client::input::{InputManager, UiAction};
use client::network::{Connection, ServerEvent};
use client::rendering::Renderer;
use log::{error, info, warn};
use macroquad::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:3000")]
    server: String,

    /// Room code to join as soon as the connection is up
    #[arg(short = 'r', long)]
    room: Option<String>,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: i32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: i32,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let conf = Conf {
        window_title: "Tic-Tac-Toe".to_string(),
        window_width: args.width,
        window_height: args.height,
        ..Default::default()
    };

    macroquad::Window::from_config(conf, async move {
        if let Err(e) = run(args).await {
            error!("Client error: {}", e);
        }
    });
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    info!("Click Create for a new room, or type a code and press Enter to join");

    let mut connection = Connection::new(&args.server)?;
    let mut state = ClientGameState::new();
    let mut input = InputManager::new();
    let renderer = Renderer::new(args.width as f32, args.height as f32);
    let mut auto_join = args.room;

    if let Err(e) = connection.connect() {
        warn!("Failed to send connect request: {}", e);
    }
    prevent_quit();

    loop {
        for event in connection.poll() {
            if matches!(event, ServerEvent::Connected { .. }) {
                if let Some(room_id) = auto_join.take() {
                    if let Err(e) = connection.join_room(&room_id) {
                        warn!("Failed to join room {}: {}", room_id, e);
                    }
                }
            }
            state.apply(&event);
        }

        for action in input.update(renderer.layout()) {
            if let Err(e) = dispatch(&mut connection, &mut state, action) {
                warn!("Failed to send request: {}", e);
            }
        }

        if let Err(e) = connection.heartbeat_if_due() {
            warn!("Failed to send heartbeat: {}", e);
        }
        renderer.render(&state, input.join_code());

        if is_quit_requested() {
            break;
        }
        next_frame().await;
    }

    if connection.is_connected() {
        connection.disconnect()?;
    }
    connection.shutdown();
    Ok(())
}

fn dispatch(
    connection: &mut Connection,
    state: &mut ClientGameState,
    action: UiAction,
) -> Result<(), Box<dyn std::error::Error>> {
    if !connection.is_connected() {
        return Ok(());
    }

    match action {
        UiAction::CreateRoom => {
            connection.create_room()?;
        }
        UiAction::JoinRoom(room_id) => {
            connection.join_room(&room_id)?;
        }
        UiAction::Move(index) => {
            if let Some(room_id) = &state.room_id {
                if state.can_move(index) {
                    connection.make_move(room_id.as_str(), index as i32)?;
                }
            }
        }
        UiAction::ResetGame => {
            if let Some(room_id) = &state.room_id {
                connection.reset_game(room_id.as_str())?;
            }
        }
        UiAction::LeaveRoom => {
            if let Some(room_id) = state.room_id.clone() {
                connection.leave_room(room_id.as_str())?;
                state.leave();
            }
        }
    }
    Ok(())
}
