use anyhow::{Context, Result};
use promptmidi::{
    api::ChatClient,
    config::AppConfig,
    playback::{PlaybackOutcome, Player},
    session::{Generation, MenuChoice, Session},
    setup_tracing,
    store::CompositionStore,
};
use std::io::{self, BufRead, Write};
use tracing::info;

const MENU_PROMPT: &str = "Enter 'f' to follow up, 'p' to play again, or 'q' to quit: ";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    setup_tracing()?;

    let config = AppConfig::load()?;
    let client = ChatClient::new(config.api_base(), config.api_key(), config.model())?;
    let store = CompositionStore::open(config.database_path())?;
    info!(
        endpoint = %client.base_url(),
        model = config.model(),
        database = %config.database_path().display(),
        "starting composer"
    );
    let mut session = Session::new(client, store, Player::new(), config.midi_dir().to_path_buf());

    println!("Welcome to the AI Piano Composer.");
    println!("Describe the kind of piano music you want to hear.");
    println!("You can mention mood, tempo, style, or any other preferences.");
    let Some(prompt) = read_line("Your music description: ")? else {
        return Ok(());
    };

    let generation = session.start(prompt).await?;
    announce(generation)?;
    println!("Playing the generated music...");
    play(&session);

    loop {
        let Some(choice) = read_line(MENU_PROMPT)? else {
            break;
        };
        match MenuChoice::parse(&choice) {
            Some(MenuChoice::Replay) => {
                println!("Playing the music again...");
                play(&session);
            }
            Some(MenuChoice::FollowUp) => {
                println!("Follow up with more details...");
                let Some(text) = read_line("Your follow-up description: ")? else {
                    break;
                };
                let generation = session.follow_up(text).await?;
                announce(generation)?;
                println!("Playing the new music...");
                play(&session);
            }
            Some(MenuChoice::Quit) => {
                println!("See ya");
                break;
            }
            None => println!("Invalid choice. Please try again."),
        }
    }

    Ok(())
}

fn announce(generation: &Generation) -> Result<()> {
    let pretty = serde_json::to_string_pretty(&generation.composition)
        .context("failed to format composition")?;
    println!("AI-generated composition: {pretty}");
    println!("Generated MIDI file: {}", generation.midi_path.display());
    Ok(())
}

fn play<R: promptmidi::session::Requestor>(session: &Session<R>) {
    println!("(press 'q' to stop playback)");
    if let Some(PlaybackOutcome::Failed) = session.play_latest() {
        println!("Playback failed; the MIDI file is still on disk.");
    }
}

// None on EOF
fn read_line(label: &str) -> Result<Option<String>> {
    print!("{label}");
    io::stdout().flush().context("failed to flush stdout")?;
    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line).context("failed to read input")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}
