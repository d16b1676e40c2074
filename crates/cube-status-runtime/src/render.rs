//! Embed rendering for status messages.

use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use cube_discord::{Embed, EmbedField, EmbedThumbnail, MessagePayload};
use cube_protocol::{PlayerStat, ServerAddr, Team};

use crate::aggregate::ReportableEntry;

const THUMBNAIL_URL: &str = "https://avatars.githubusercontent.com/u/5957666?s=200&v=4";
const EMPTY_DIRECTORY_NOTICE: &str = "No servers with players online right now.";
// Discord rejects messages carrying more than ten embeds.
const MAX_EMBEDS_PER_MESSAGE: usize = 10;
const GAME_MODE_COOPEDIT: i32 = 1;
const TEAM_CLA_COLOR: u32 = 0xFF0000;
const TEAM_RVSF_COLOR: u32 = 0x0000FF;

const GAME_MODE_NAMES: [&str; 22] = [
    "Team Deathmatch",
    "Co-operative editing",
    "Deathmatch",
    "Survivor",
    "Team Survivor",
    "Capture the Flag",
    "Pistol Frenzy",
    "Bot Team Deathmatch",
    "Bot Deathmatch",
    "Last Swiss Standing",
    "One Shot, One Kill",
    "Team One Shot, One Kill",
    "Bot One Shot, One Kill",
    "Hunt the Flag",
    "Team Keep the Flag",
    "Keep the Flag",
    "Team Pistol Frenzy",
    "Team Last Swiss Standing",
    "Bot Pistol Frenzy",
    "Bot Last Swiss Standing",
    "Bot Team Survivor",
    "Bot Team One Shot, One Kill",
];

pub fn game_mode_name(mode: i32) -> &'static str {
    usize::try_from(mode)
        .ok()
        .and_then(|index| GAME_MODE_NAMES.get(index))
        .copied()
        .unwrap_or("Unknown mode")
}

fn mastermode_label(mastermode: i32) -> &'static str {
    match mastermode {
        0 => "Open",
        1 => "Private",
        2 => "Match",
        _ => "Unknown",
    }
}

fn mastermode_emoji(mastermode: i32) -> &'static str {
    match mastermode {
        0 => "\u{1f513}",
        1 => "\u{1f512}",
        2 => "\u{2694}\u{fe0f}",
        _ => "\u{2754}",
    }
}

/// Strips cube color escapes (`\f` plus a code character) from descriptions.
pub fn clean_description(raw: &str) -> String {
    static COLOR_CODES: OnceLock<Regex> = OnceLock::new();
    let pattern = COLOR_CODES.get_or_init(|| Regex::new("\u{c}[0-9A-Z]").expect("static pattern"));
    pattern.replace_all(raw, "").trim().to_string()
}

/// Deterministic 24-bit embed color derived from the server identity, so a
/// server keeps its color across cycles and restarts.
pub fn server_color(addr: &ServerAddr) -> u32 {
    let digest = Sha256::digest(addr.to_string().as_bytes());
    (u32::from(digest[0]) << 16) | (u32::from(digest[1]) << 8) | u32::from(digest[2])
}

/// One embed per populated server, capped at the Discord embed limit.
pub fn render_directory_message(entries: &[ReportableEntry]) -> MessagePayload {
    if entries.is_empty() {
        return MessagePayload::from_text(EMPTY_DIRECTORY_NOTICE);
    }
    if entries.len() > MAX_EMBEDS_PER_MESSAGE {
        tracing::debug!(
            "dropping {} populated servers beyond the embed limit",
            entries.len() - MAX_EMBEDS_PER_MESSAGE
        );
    }
    let embeds = entries
        .iter()
        .take(MAX_EMBEDS_PER_MESSAGE)
        .map(|entry| server_embed(entry, server_color(&entry.addr), Vec::new()))
        .collect();
    MessagePayload::from_embeds(embeds)
}

/// Single embed with team score and per-player statistics tables. The color
/// follows the leading team; ties fall back to the identity color.
pub fn render_single_server_message(entry: &ReportableEntry) -> MessagePayload {
    let color = single_server_color(entry);
    let fields = player_stat_fields(entry);
    MessagePayload::from_embeds(vec![server_embed(entry, color, fields)])
}

fn server_embed(entry: &ReportableEntry, color: u32, fields: Vec<EmbedField>) -> Embed {
    let status = &entry.status;
    let title = clean_description(&status.description);
    let minutes = if status.mode == GAME_MODE_COOPEDIT {
        "\u{221e}".to_string()
    } else {
        status.minutes_remaining.to_string()
    };
    let connect = format!("/connect {} {}", entry.addr.host, entry.addr.game_port());

    Embed {
        title: format!(
            "{} {} `{}` {}/{} players online",
            title,
            mastermode_emoji(status.mastermode),
            mastermode_label(status.mastermode),
            status.connected_clients,
            status.max_clients
        ),
        description: format!(
            "**{}** on map **{}**, **{} minutes** remaining.\n\n{}",
            game_mode_name(status.mode),
            status.map,
            minutes,
            connect
        ),
        color,
        thumbnail: Some(EmbedThumbnail {
            url: THUMBNAIL_URL.to_string(),
        }),
        fields,
    }
}

fn single_server_color(entry: &ReportableEntry) -> u32 {
    let (cla_flags, cla_frags) = team_totals(&entry.players, Team::Cla);
    let (rvsf_flags, rvsf_frags) = team_totals(&entry.players, Team::Rvsf);
    if cla_flags > rvsf_flags || (cla_flags == rvsf_flags && cla_frags > rvsf_frags) {
        TEAM_CLA_COLOR
    } else if rvsf_flags > cla_flags || (cla_flags == rvsf_flags && rvsf_frags > cla_frags) {
        TEAM_RVSF_COLOR
    } else {
        server_color(&entry.addr)
    }
}

fn team_totals(players: &[PlayerStat], team: Team) -> (i32, i32) {
    players
        .iter()
        .filter(|player| player.team == team)
        .fold((0, 0), |(flags, frags), player| {
            (flags + player.flags, frags + player.frags)
        })
}

fn player_stat_fields(entry: &ReportableEntry) -> Vec<EmbedField> {
    if entry.players.is_empty() {
        return Vec::new();
    }

    let flag_mode = game_mode_name(entry.status.mode)
        .to_lowercase()
        .contains("flag");
    let cla = team_players(&entry.players, Team::Cla);
    let rvsf = team_players(&entry.players, Team::Rvsf);
    let spect = team_players(&entry.players, Team::Spect);

    let (cla_flags, cla_frags) = team_totals(&entry.players, Team::Cla);
    let (rvsf_flags, rvsf_frags) = team_totals(&entry.players, Team::Rvsf);
    let team_score = if flag_mode {
        format!("**CLA {cla_flags} ({cla_frags})** vs **RVSF {rvsf_flags} ({rvsf_frags})**")
    } else {
        format!("**CLA {cla_frags}** vs **RVSF {rvsf_frags}**")
    };

    let header = if flag_mode {
        "```name            flags frags deaths tks acc damage```"
    } else {
        "```name            frags deaths tks acc damage```"
    };
    let mut table = format!(
        "{header}\n\n```CLA```\n{}\n\n```RVSF```\n{}",
        team_rows(&cla, flag_mode, true),
        team_rows(&rvsf, flag_mode, true)
    );
    if !spect.is_empty() {
        table.push_str(&format!(
            "\n\n```SPECT```\n{}",
            team_rows(&spect, flag_mode, false)
        ));
    }

    vec![
        EmbedField {
            name: "Team Score".to_string(),
            value: team_score,
            inline: false,
        },
        EmbedField {
            name: "Player Statistics".to_string(),
            value: table,
            inline: false,
        },
    ]
}

fn team_players<'a>(players: &'a [PlayerStat], team: Team) -> Vec<&'a PlayerStat> {
    players
        .iter()
        .filter(|player| player.team == team)
        .collect()
}

fn team_rows(players: &[&PlayerStat], flag_mode: bool, show_stats: bool) -> String {
    let mut rows = Vec::new();
    for player in players {
        let name = format!("{:<15}", truncate_name(&player.name));
        if !show_stats {
            rows.push(name);
            continue;
        }
        let frags = center(&player.frags.to_string(), 5);
        let deaths = center(&player.deaths.to_string(), 6);
        let teamkills = center(&player.teamkills.to_string(), 3);
        let accuracy = center(&format!("{:.0}%", player.accuracy), 3);
        let damage = center(&player.damage.to_string(), 8);
        let row = if flag_mode {
            let flags = format!("{:>4}", player.flags);
            format!("{name} {flags} {frags} {deaths} {teamkills} {accuracy} {damage}")
        } else {
            format!("{name} {frags} {deaths} {teamkills} {accuracy} {damage}")
        };
        rows.push(row);
    }
    format!("```\n{}```", rows.join("\n"))
}

fn truncate_name(name: &str) -> String {
    name.chars().take(15).collect()
}

fn center(value: &str, width: usize) -> String {
    format!("{value:^width$}")
}
