use crate::{
    api::ChatClient,
    conversation::{follow_up_prompt, Conversation},
    midi,
    parser::{self, fallback_composition},
    playback::{PlaybackOutcome, Player},
    store::CompositionStore,
    types::{Composition, NewComposition},
};
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    FollowUp,
    Replay,
    Quit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "f" => Some(Self::FollowUp),
            "p" => Some(Self::Replay),
            "q" => Some(Self::Quit),
            _ => None,
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait Requestor {
    async fn complete(
        &self,
        conversation: Conversation,
        user: String,
    ) -> Result<(Conversation, String)>;
}

impl Requestor for ChatClient {
    async fn complete(
        &self,
        conversation: Conversation,
        user: String,
    ) -> Result<(Conversation, String)> {
        ChatClient::complete(self, conversation, user).await
    }
}

// One request/parse/encode/store cycle.
#[derive(Debug, Clone)]
pub struct Generation {
    pub record_id: i64,
    pub composition: Composition,
    pub midi_path: PathBuf,
    pub midi_filename: String,
    pub raw_response: String,
}

pub fn playable_or_fallback(composition: Composition) -> Composition {
    match composition.check_playable() {
        Ok(()) => composition,
        Err(err) => {
            warn!("composition cannot be encoded ({err}); using default");
            fallback_composition()
        }
    }
}

pub fn render_response(
    raw: &str,
    name_source: &str,
    is_original: bool,
    midi_dir: &Path,
) -> Result<(Composition, PathBuf)> {
    let composition = playable_or_fallback(parser::parse(raw));
    let path = midi::write_composition(&composition, name_source, is_original, midi_dir)?;
    Ok((composition, path))
}

pub struct Session<R> {
    requestor: R,
    store: CompositionStore,
    player: Player,
    midi_dir: PathBuf,
    conversation: Conversation,
    original_prompt: Option<String>,
    latest: Option<Generation>,
}

impl<R: Requestor> Session<R> {
    pub fn new(requestor: R, store: CompositionStore, player: Player, midi_dir: PathBuf) -> Self {
        Self {
            requestor,
            store,
            player,
            midi_dir,
            conversation: Conversation::new(),
            original_prompt: None,
            latest: None,
        }
    }

    pub async fn start(&mut self, prompt: String) -> Result<&Generation> {
        let generation = self.cycle(prompt.clone(), &prompt, true, prompt.clone(), None).await?;
        self.original_prompt = Some(prompt);
        Ok(self.latest.insert(generation))
    }

    pub async fn follow_up(&mut self, text: String) -> Result<&Generation> {
        let (original, previous) = match (&self.original_prompt, &self.latest) {
            (Some(original), Some(previous)) => (original, previous),
            _ => return Err(anyhow!("no original composition to follow up on")),
        };
        let turn = follow_up_prompt(original, &previous.midi_filename, &text);
        let parent_id = previous.record_id;
        let generation = self.cycle(turn.clone(), &text, false, turn, Some(parent_id)).await?;
        Ok(self.latest.insert(generation))
    }

    async fn cycle(
        &mut self,
        user_turn: String,
        name_source: &str,
        is_original: bool,
        stored_prompt: String,
        parent_id: Option<i64>,
    ) -> Result<Generation> {
        let conversation = std::mem::take(&mut self.conversation);
        let (conversation, raw) = self.requestor.complete(conversation, user_turn).await?;
        self.conversation = conversation;

        let (composition, midi_path) =
            render_response(&raw, name_source, is_original, &self.midi_dir)?;
        let midi_filename = midi::midi_filename(name_source, is_original);

        let record_id = self.store.insert(&NewComposition {
            prompt: stored_prompt,
            gpt_response: raw.clone(),
            midi_filename: midi_filename.clone(),
            parent_id,
            is_original,
        })?;
        info!(record_id, file = %midi_filename, "stored composition");

        Ok(Generation { record_id, composition, midi_path, midi_filename, raw_response: raw })
    }

    pub fn latest(&self) -> Option<&Generation> {
        self.latest.as_ref()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn store(&self) -> &CompositionStore {
        &self.store
    }

    pub fn play_latest(&self) -> Option<PlaybackOutcome> {
        self.latest.as_ref().map(|generation| self.player.play(&generation.midi_path))
    }
}
