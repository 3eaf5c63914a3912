//! Fallback story graphs and traversal.
//!
//! One immutable directed graph of narrative nodes per theme family.
//! These graphs are what players get when no generative backend is
//! reachable, so every node is written to fit a radio frame once
//! formatted with its choice line.
//!
//! Traversal is deliberately forgiving: unknown themes land on the
//! default theme, unknown nodes land on the entry node, and an invalid
//! choice silently restarts the story rather than surfacing an error.

use crate::config::ChoiceAlphabet;
use std::collections::HashMap;

/// Canonical default theme.
pub const DEFAULT_THEME: &str = "fantasy";

/// Entry node id of every graph.
pub const ENTRY_NODE: &str = "start";

/// Canonical end-of-story marker. Terminal node text carries it, and
/// generated text containing it ends the session.
pub const END_MARKER: &str = "THE END";

/// Every theme a start command may name.
pub const VALID_THEMES: &[&str] = &[
    "fantasy",
    "medieval",
    "scifi",
    "horror",
    "dark_fantasy",
    "urban_fantasy",
    "steampunk",
    "dieselpunk",
    "cyberpunk",
    "post_apocalypse",
    "dystopian",
    "space_opera",
    "cosmic_horror",
    "occult",
    "ancient",
    "renaissance",
    "victorian",
    "wild_west",
    "comedy",
    "noir",
    "mystery",
    "romance",
    "slice_of_life",
    "grimdark",
    "wholesome",
    "high_school",
    "college",
    "corporate",
    "pirate",
    "expedition",
    "anime",
    "superhero",
    "fairy_tale",
    "mythology",
];

/// One node of a story graph.
#[derive(Debug, Clone)]
pub struct StoryNode {
    /// Narrative prose.
    pub text: &'static str,

    /// Choice labels, in order. Empty for terminal nodes.
    pub choices: &'static [&'static str],

    /// Target node ids, parallel to `choices`.
    pub next: &'static [&'static str],
}

impl StoryNode {
    /// True iff this node ends the story.
    pub fn is_terminal(&self) -> bool {
        self.choices.is_empty()
    }

    /// Render the node as outbound text: prose, then one line of
    /// labelled choices. Terminal nodes render as bare prose, which is
    /// how callers tell "story over" from "story continues".
    pub fn format(&self, alphabet: ChoiceAlphabet) -> String {
        if self.is_terminal() {
            return self.text.to_string();
        }
        let line = self
            .choices
            .iter()
            .enumerate()
            .map(|(i, label)| format!("{}:{}", alphabet.label(i + 1), label))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{}\n{}", self.text, line)
    }
}

/// An immutable per-theme story graph.
#[derive(Debug)]
pub struct StoryGraph {
    nodes: HashMap<&'static str, StoryNode>,
}

impl StoryGraph {
    fn new(entries: &[(&'static str, StoryNode)]) -> Self {
        Self {
            nodes: entries.iter().cloned().collect(),
        }
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&StoryNode> {
        self.nodes.get(id)
    }

    /// The graph's entry node.
    pub fn entry(&self) -> &StoryNode {
        &self.nodes[ENTRY_NODE]
    }

    /// Follow a 1-based choice from `node_id`.
    ///
    /// An unknown `node_id` is treated as the entry node; a choice
    /// index with no outgoing edge restarts at the entry node.
    pub fn advance(&self, node_id: &str, choice: usize) -> &'static str {
        let node = match self.nodes.get(node_id) {
            Some(node) => node,
            None => self.entry(),
        };
        match choice.checked_sub(1).and_then(|i| node.next.get(i)) {
            Some(target) => target,
            None => ENTRY_NODE,
        }
    }

    /// Iterate over `(id, node)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&&'static str, &StoryNode)> {
        self.nodes.iter()
    }
}

/// Resolve a requested theme to a valid one, substituting the default
/// for anything unknown. Matching is case-insensitive.
pub fn canonical_theme(theme: &str) -> &'static str {
    let wanted = theme.trim().to_ascii_lowercase();
    VALID_THEMES
        .iter()
        .find(|t| **t == wanted)
        .copied()
        .unwrap_or(DEFAULT_THEME)
}

/// The story graph for a theme (default graph for unknown themes).
pub fn graph(theme: &str) -> &'static StoryGraph {
    let family = THEME_FAMILIES
        .get(canonical_theme(theme))
        .copied()
        .unwrap_or("fantasy");
    &GRAPHS[family]
}

/// The entry node for a theme.
pub fn entry(theme: &str) -> &'static StoryNode {
    graph(theme).entry()
}

/// Follow a 1-based choice from `node_id` in a theme's graph.
pub fn advance(theme: &str, node_id: &str, choice: usize) -> &'static str {
    graph(theme).advance(node_id, choice)
}

// ============================================================================
// Node construction helpers
// ============================================================================

const fn scene(
    text: &'static str,
    choices: &'static [&'static str],
    next: &'static [&'static str],
) -> StoryNode {
    StoryNode {
        text,
        choices,
        next,
    }
}

const fn ending(text: &'static str) -> StoryNode {
    StoryNode {
        text,
        choices: &[],
        next: &[],
    }
}

// ============================================================================
// Story graphs
// ============================================================================

lazy_static::lazy_static! {
    /// Distinct archetype graphs, keyed by family name.
    static ref GRAPHS: HashMap<&'static str, StoryGraph> = {
        let mut graphs = HashMap::new();
        graphs.insert("fantasy", fantasy_graph());
        graphs.insert("scifi", scifi_graph());
        graphs.insert("horror", horror_graph());
        graphs.insert("mystery", mystery_graph());
        graphs.insert("wholesome", wholesome_graph());
        graphs
    };

    /// Theme -> archetype family. Every entry of `VALID_THEMES` is here.
    static ref THEME_FAMILIES: HashMap<&'static str, &'static str> = {
        let mut families = HashMap::new();
        for theme in [
            "fantasy", "medieval", "dark_fantasy", "urban_fantasy", "grimdark",
            "fairy_tale", "mythology", "ancient", "renaissance", "pirate",
            "expedition", "superhero", "anime",
        ] {
            families.insert(theme, "fantasy");
        }
        for theme in [
            "scifi", "cyberpunk", "steampunk", "dieselpunk", "post_apocalypse",
            "dystopian", "space_opera",
        ] {
            families.insert(theme, "scifi");
        }
        for theme in ["horror", "cosmic_horror", "occult"] {
            families.insert(theme, "horror");
        }
        for theme in ["mystery", "noir", "victorian", "wild_west", "corporate"] {
            families.insert(theme, "mystery");
        }
        for theme in [
            "comedy", "romance", "slice_of_life", "wholesome", "high_school",
            "college",
        ] {
            families.insert(theme, "wholesome");
        }
        families
    };
}

fn fantasy_graph() -> StoryGraph {
    StoryGraph::new(&[
        (
            "start",
            scene(
                "You stand at a crossroads in the kingdom of Eldoria. A dusty road runs north, a dark forest looms east, and smoke rises from a village to the west.",
                &["Take the road", "Enter the forest", "Visit the village"],
                &["road", "forest", "village"],
            ),
        ),
        (
            "road",
            scene(
                "A hulking troll blocks the old stone bridge, demanding a toll of ten gold coins.",
                &["Pay the toll", "Fight the troll", "Turn back"],
                &["road_pay", "road_fight", "start"],
            ),
        ),
        (
            "road_pay",
            ending(
                "The troll counts your coins and waves you across. Beyond the bridge, the lost crown of Eldoria gleams in the grass. You lift it high. THE END",
            ),
        ),
        (
            "road_fight",
            ending(
                "The troll swings first. You duck, roll, and shove it off the bridge into the river below. The road north is clear, and the bards will sing of it. THE END",
            ),
        ),
        (
            "forest",
            scene(
                "Ancient trees whisper overhead. A wounded wolf watches you from a thicket, and somewhere deeper a bell tolls.",
                &["Help the wolf", "Follow the bell", "Turn back"],
                &["forest_wolf", "forest_bell", "start"],
            ),
        ),
        (
            "forest_wolf",
            ending(
                "You bind the wolf's wound. It leads you to a hidden glade where a silver sword waits in a stone, and it slides free at your touch. THE END",
            ),
        ),
        (
            "forest_bell",
            ending(
                "The bell hangs in a ruined chapel. As you ring it, the forest's curse lifts and sunlight floods the glade. THE END",
            ),
        ),
        (
            "village",
            scene(
                "The village square is crowded and fearful. An old woman begs for help: goblins took her grandson to the mill.",
                &["Storm the mill", "Sneak in at night", "Rally the villagers"],
                &["village_storm", "village_sneak", "village_rally"],
            ),
        ),
        (
            "village_storm",
            ending(
                "You kick in the mill door. The goblins scatter into the hills and the boy runs to your arms. The village feasts in your honor. THE END",
            ),
        ),
        (
            "village_sneak",
            ending(
                "Under moonlight you slip through a broken window and spirit the boy away before the goblins stir. THE END",
            ),
        ),
        (
            "village_rally",
            ending(
                "With torches and pitchforks the villagers march behind you. The goblins flee at the sight, and the boy is saved. THE END",
            ),
        ),
    ])
}

fn scifi_graph() -> StoryGraph {
    StoryGraph::new(&[
        (
            "start",
            scene(
                "You wake from cryosleep aboard the colony ship Meridian. Alarms pulse red. The corridor forks toward the bridge, engineering, and the cargo bay.",
                &["Head to the bridge", "Check engineering", "Search the cargo bay"],
                &["bridge", "engineering", "cargo"],
            ),
        ),
        (
            "bridge",
            scene(
                "The bridge is empty. The nav console shows the ship drifting toward an uncharted planet, and the autopilot demands an override code.",
                &["Guess the code", "Take manual control", "Back to the corridor"],
                &["bridge_code", "bridge_manual", "start"],
            ),
        ),
        (
            "bridge_code",
            ending(
                "You type the captain's birthday. The console chimes, the engines fire, and the Meridian settles into a safe orbit. THE END",
            ),
        ),
        (
            "bridge_manual",
            ending(
                "You grip the controls and wrestle the Meridian into a ragged orbit. Below, green continents turn under white clouds. A new home. THE END",
            ),
        ),
        (
            "engineering",
            scene(
                "The reactor sputters behind cracked shielding. A maintenance drone offers you a toolkit with one good manipulator.",
                &["Patch the shielding", "Reroute the power", "Back to the corridor"],
                &["eng_patch", "eng_reroute", "start"],
            ),
        ),
        (
            "eng_patch",
            ending(
                "Plate by plate you seal the cracks. The reactor steadies, the alarms die, and the drone beeps something like gratitude. THE END",
            ),
        ),
        (
            "eng_reroute",
            ending(
                "You reroute power through the backup bus. Half the lights go dark, but the engines hold, and the colony will wake on schedule. THE END",
            ),
        ),
        (
            "cargo",
            scene(
                "Rows of cryopods line the cargo bay. One stands open and empty, its occupant's tracker blinking two decks down.",
                &["Follow the tracker", "Wake the crew", "Back to the corridor"],
                &["cargo_track", "cargo_wake", "start"],
            ),
        ),
        (
            "cargo_track",
            ending(
                "The tracker leads to the observation deck, where the missing colonist stands watching the new planet rise. You watch it together. THE END",
            ),
        ),
        (
            "cargo_wake",
            ending(
                "One by one the pods hiss open. Groggy colonists crowd the bay as the intercom crackles: orbit achieved. THE END",
            ),
        ),
    ])
}

fn horror_graph() -> StoryGraph {
    StoryGraph::new(&[
        (
            "start",
            scene(
                "Rain hammers the windows of Blackwood Manor and the front door has locked itself behind you. Stairs climb into dark; candlelight leaks under the cellar door.",
                &["Climb the stairs", "Open the cellar door", "Force the front door"],
                &["stairs", "cellar", "door"],
            ),
        ),
        (
            "stairs",
            scene(
                "On the landing hangs a portrait whose eyes follow you. Behind it, a wall safe stands ajar.",
                &["Open the safe", "Tear down the portrait", "Go back down"],
                &["stairs_safe", "stairs_portrait", "start"],
            ),
        ),
        (
            "stairs_safe",
            ending(
                "Inside the safe lies a journal and a single iron key. The key fits the front door, and you do not look back. THE END",
            ),
        ),
        (
            "stairs_portrait",
            ending(
                "The portrait comes down and the whispering stops. Morning light finds you asleep in the hall, the manor merely old and empty. THE END",
            ),
        ),
        (
            "cellar",
            scene(
                "Candles ring a circle of salt on the cellar floor. Something outside the circle is breathing.",
                &["Step into the circle", "Blow out the candles", "Back away slowly"],
                &["cellar_circle", "cellar_dark", "start"],
            ),
        ),
        (
            "cellar_circle",
            ending(
                "Inside the salt, the breathing cannot reach you. You wait out the longest night of your life, and at dawn the house lets you go. THE END",
            ),
        ),
        (
            "cellar_dark",
            ending(
                "Darkness swallows the cellar, and with it the breathing. When you strike a match, the circle is empty and the front door stands open. THE END",
            ),
        ),
        (
            "door",
            ending(
                "You put your shoulder to the oak until the lock splinters. Cold night air has never tasted sweeter. THE END",
            ),
        ),
    ])
}

fn mystery_graph() -> StoryGraph {
    StoryGraph::new(&[
        (
            "start",
            scene(
                "The gallery's prized painting vanished at midnight. Three leads: a nervous curator, muddy footprints by the window, and a pawn shop ticket in the frame.",
                &["Question the curator", "Follow the footprints", "Visit the pawn shop"],
                &["curator", "footprints", "pawnshop"],
            ),
        ),
        (
            "curator",
            scene(
                "The curator's alibi is thin and his hands shake. He keeps glancing at the storage room door.",
                &["Search the storage room", "Press him harder", "Try another lead"],
                &["curator_storage", "curator_press", "start"],
            ),
        ),
        (
            "curator_storage",
            ending(
                "Behind a false panel in the storage room, the painting leans in its crate. The curator confesses before you even ask. THE END",
            ),
        ),
        (
            "curator_press",
            ending(
                "He cracks: a gambling debt, a buyer abroad, a crate mislabeled as prints. The painting never left the loading dock. Case closed. THE END",
            ),
        ),
        (
            "footprints",
            ending(
                "The prints end at a drainpipe and a torn cuff of expensive wool. Only one man in town wears that tailor, and he answers his door still wearing the other cuff. THE END",
            ),
        ),
        (
            "pawnshop",
            ending(
                "The ticket was planted, but the pawnbroker remembers who bought it: the gallery's own security chief. His locker holds the rolled canvas. THE END",
            ),
        ),
    ])
}

fn wholesome_graph() -> StoryGraph {
    StoryGraph::new(&[
        (
            "start",
            scene(
                "The neighborhood bake sale opens in one hour and your oven just died. Your kitchen holds flour, three eggs, and a stubborn sense of optimism.",
                &["Borrow a neighbor's oven", "Make no-bake treats", "Buy cookies and confess"],
                &["neighbor", "nobake", "confess"],
            ),
        ),
        (
            "neighbor",
            scene(
                "Mrs. Alvarez opens her door to the smell of cinnamon. Her oven is free, but her cat has opinions about your mixing bowl.",
                &["Bake together", "Bribe the cat", "Head home"],
                &["neighbor_bake", "neighbor_cat", "start"],
            ),
        ),
        (
            "neighbor_bake",
            ending(
                "Two batches, one kitchen, and her grandmother's secret glaze. Your stall sells out first and you split the ribbon down the middle. THE END",
            ),
        ),
        (
            "neighbor_cat",
            ending(
                "One sardine later the cat supervises from the windowsill while the muffins rise. Best batch of your life. THE END",
            ),
        ),
        (
            "nobake",
            ending(
                "Oats, honey, and a double boiler save the day. The no-bake bars vanish before noon and three people demand the recipe. THE END",
            ),
        ),
        (
            "confess",
            ending(
                "You set out the shop cookies with a sign reading 'my oven quit, the baker didn't.' It raises more for the library than any stall. THE END",
            ),
        ),
    ])
}
