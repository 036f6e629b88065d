use std::io::{self, Write};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use survive_core::{
    catalog::PhotoAlbum, DecisionPort, EndingKind, ItemCategory, Mode, SessionController,
    StoryEntry,
};
use tracing::{info, warn};

const INSTRUCTIONS: &str = "\
Each scene ends with numbered choices. Type a number to take one.
Fights use your weakest weapon that can still win; without one you use your fists.
Weapons wear down and break. Consumables restore health: `use <item>`.
You can carry 2 weapons, 3 consumables and 1 key item.
Reaching a winning ending saves it to your slot's photo album.";

const HELP: &str = "\
Title:    new <slot> <name> | load <slot> | album <slot> | help | quit
Stories:  <number> | stories | reset
Scene:    <number> | use <item> | stories | reset
Anywhere: dark | quit";

/// One line of player input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A numbered option, stored zero-based.
    Pick(usize),
    /// Use a consumable.
    Use(String),
    /// Toggle dark mode.
    Dark,
    /// Abandon the run and return to the title screen.
    Reset,
    /// List stories, or leave the current one for another.
    Stories,
    /// Leave the program.
    Quit,
    /// Claim a slot for a new player.
    New { slot: u8, name: String },
    /// Resume a slot.
    Load(u8),
    /// Show a slot's photo album.
    Album(u8),
    /// Instructions on the title screen, command help elsewhere.
    Help,
    /// Return to the title screen.
    Back,
    /// An empty line.
    Continue,
}

/// Parse a line typed at the main prompt.
pub fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Continue);
    }
    if let Ok(number) = line.parse::<usize>() {
        return number
            .checked_sub(1)
            .map(Command::Pick)
            .ok_or_else(|| anyhow!("options are numbered from 1"));
    }

    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map(|(word, rest)| (word, rest.trim()))
        .unwrap_or((line, ""));
    match word.to_lowercase().as_str() {
        "use" if rest.is_empty() => bail!("usage: use <item>"),
        "use" => Ok(Command::Use(rest.to_string())),
        "dark" => Ok(Command::Dark),
        "reset" => Ok(Command::Reset),
        "stories" => Ok(Command::Stories),
        "quit" | "exit" => Ok(Command::Quit),
        "help" => Ok(Command::Help),
        "back" => Ok(Command::Back),
        "new" => {
            let (slot, name) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            Ok(Command::New {
                slot: parse_slot(slot)?,
                name: name.trim().to_string(),
            })
        }
        "load" => Ok(Command::Load(parse_slot(rest)?)),
        "album" => Ok(Command::Album(parse_slot(rest)?)),
        other => bail!("unknown command `{other}`; type help"),
    }
}

fn parse_slot(raw: &str) -> Result<u8> {
    let raw = raw.trim();
    raw.parse()
        .with_context(|| format!("`{raw}` is not a slot number"))
}

/// Line-based frontend over a [`SessionController`].
pub struct App<D> {
    session: SessionController<D>,
    stories: Vec<StoryEntry>,
    album: Option<PhotoAlbum>,
}

impl<D: DecisionPort> App<D> {
    pub fn new(session: SessionController<D>) -> Self {
        Self {
            session,
            stories: Vec::new(),
            album: None,
        }
    }

    /// Read commands from stdin until `quit` or end of input.
    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        loop {
            self.render(&mut stdout)?;
            write!(stdout, "> ")?;
            stdout.flush()?;

            let mut line = String::new();
            if io::stdin().read_line(&mut line)? == 0 {
                break;
            }
            match parse_command(&line) {
                Ok(Command::Quit) => break,
                Ok(command) => {
                    if let Err(err) = self.handle(command, &mut stdout) {
                        warn!("{err:#}");
                        writeln!(stdout, "! {err:#}")?;
                    }
                }
                Err(err) => writeln!(stdout, "! {err}")?,
            }
        }
        info!("Session closed");
        Ok(())
    }

    /// Apply one command to the session.
    pub fn handle(&mut self, command: Command, out: &mut impl Write) -> Result<()> {
        let mode = self.session.mode().clone();
        match (mode, command) {
            (_, Command::Quit) => {}
            (_, Command::Dark) => {
                let dark = self.session.toggle_dark_mode();
                writeln!(out, "Dark mode {}.", if dark { "on" } else { "off" })?;
            }
            (Mode::Title, Command::Help) => self.session.show_instructions()?,
            (_, Command::Help) => writeln!(out, "{HELP}")?,
            (Mode::Title, Command::New { slot, name }) => {
                self.session.start_new_game(slot, &name)?;
                self.refresh_stories()?;
            }
            (Mode::Title, Command::Load(slot)) => {
                if !self.session.load_game(slot)? {
                    writeln!(out, "Slot {slot} is empty.")?;
                } else if self.session.mode() == &Mode::StorySelect {
                    self.refresh_stories()?;
                }
            }
            (Mode::Title, Command::Album(slot)) => {
                self.album = Some(self.session.open_photo_album(slot)?);
            }
            (Mode::Instructions | Mode::PhotoAlbum { .. }, Command::Back | Command::Continue) => {
                self.album = None;
                self.session.back_to_title()?;
            }
            (Mode::StorySelect, Command::Pick(index)) => {
                let story = self
                    .stories
                    .get(index)
                    .cloned()
                    .ok_or_else(|| anyhow!("there is no story {}", index + 1))?;
                self.session.select_story(&story.path)?;
            }
            (Mode::StorySelect, Command::Stories) => self.refresh_stories()?,
            (Mode::Ending(_), Command::Continue) => {
                self.session.acknowledge_ending()?;
                self.refresh_stories()?;
            }
            (mode, Command::Pick(index)) if mode.is_playing() => self.session.choose(index)?,
            (mode, Command::Use(name)) if mode.is_playing() => {
                if self.session.consume(&name)? {
                    writeln!(out, "You use the {name}.")?;
                } else {
                    writeln!(out, "You have no consumable called {name}.")?;
                }
            }
            (mode, Command::Stories) if mode.is_playing() => {
                self.session.choose_another_story()?;
                self.refresh_stories()?;
            }
            (Mode::Title, Command::Reset) => {}
            (_, Command::Reset) => {
                if self.session.request_reset() {
                    self.stories.clear();
                }
            }
            (_, Command::Continue) => {}
            (mode, command) => bail!("{command:?} is not available on the {mode} screen"),
        }
        Ok(())
    }

    fn refresh_stories(&mut self) -> Result<()> {
        self.stories = self.session.stories()?;
        Ok(())
    }

    /// Print the screen for the current mode.
    pub fn render(&self, out: &mut impl Write) -> Result<()> {
        writeln!(out)?;
        match self.session.mode() {
            Mode::Title => self.render_title(out)?,
            Mode::Instructions => writeln!(out, "{INSTRUCTIONS}\n\n(press Enter to go back)")?,
            Mode::StorySelect => {
                writeln!(out, "Choose a story:")?;
                if self.stories.is_empty() {
                    writeln!(out, "  (no stories found)")?;
                }
                for (index, story) in self.stories.iter().enumerate() {
                    writeln!(out, "  {}. {}", index + 1, story.title)?;
                }
            }
            Mode::InventorySetup | Mode::InScene => self.render_scene(out)?,
            Mode::Ending(kind) => {
                if let Some(scene) = self.session.current_scene() {
                    writeln!(out, "{}\n", scene.prompt)?;
                }
                match kind {
                    EndingKind::Won { scene_id } => {
                        writeln!(out, "You survived! Ending `{scene_id}` added to your album.")?
                    }
                    EndingKind::Lost => writeln!(out, "You did not make it.")?,
                    EndingKind::Finished => writeln!(out, "The story ends here.")?,
                }
                writeln!(out, "(press Enter to pick another story)")?;
            }
            Mode::PhotoAlbum { slot } => {
                writeln!(out, "Photo album for slot {slot}:")?;
                if let Some(album) = &self.album {
                    for entry in &album.unlocked {
                        writeln!(out, "  [x] {} - {}", entry.story_title, entry.scene_id)?;
                    }
                    for entry in &album.locked {
                        writeln!(out, "  [ ] {} - ???", entry.story_title)?;
                    }
                }
                writeln!(out, "(press Enter to go back)")?;
            }
        }
        Ok(())
    }

    fn render_title(&self, out: &mut impl Write) -> Result<()> {
        writeln!(out, "=== SURVIVE ===")?;
        for summary in self.session.saves().summaries() {
            match (&summary.player_name, summary.last_updated) {
                (Some(name), Some(updated)) => writeln!(
                    out,
                    "  Slot {}: {name} ({})",
                    summary.slot,
                    updated.with_timezone(&Local).format("%Y-%m-%d %H:%M")
                )?,
                (Some(name), None) => writeln!(out, "  Slot {}: {name}", summary.slot)?,
                (None, _) => writeln!(out, "  Slot {}: empty", summary.slot)?,
            }
        }
        writeln!(out, "Commands: new <slot> <name>, load <slot>, album <slot>, help, quit")?;
        Ok(())
    }

    fn render_scene(&self, out: &mut impl Write) -> Result<()> {
        let Some(scene) = self.session.current_scene() else {
            return Ok(());
        };
        let player = self.session.player();
        let theme = if player.dark_mode { " | dark" } else { "" };
        writeln!(out, "Health {}{theme}", player.health)?;
        for category in ItemCategory::ALL {
            let items = player.inventory.items(category);
            let names: Vec<String> = items
                .iter()
                .map(|item| match category {
                    ItemCategory::Weapon => {
                        format!("{} ({}/{})", item.name, item.power(), item.durability())
                    }
                    ItemCategory::Consumable => format!("{} (+{})", item.name, item.health_restore()),
                    ItemCategory::KeyItem => item.name.clone(),
                })
                .collect();
            writeln!(
                out,
                "{}: {}",
                category.label(),
                if names.is_empty() { "-".to_string() } else { names.join(", ") }
            )?;
        }
        writeln!(out, "\n{}\n", scene.prompt)?;
        for (index, choice) in scene.choices.iter().enumerate() {
            let marker = if self.session.is_choice_available(choice) {
                ""
            } else {
                " (unavailable)"
            };
            writeln!(out, "  {}. {}{marker}", index + 1, choice.label)?;
        }
        Ok(())
    }
}
