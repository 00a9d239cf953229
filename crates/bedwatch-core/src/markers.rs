//! Chat line classification.
//!
//! The server announces every phase change in chat. [`classify`] turns one raw
//! line into at most one [`ChatSignal`]; lines that mean nothing to the tracker
//! yield `None`.

use crate::world::strip_formatting;

/// Phase-relevant meaning of one chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatSignal {
    /// The server is moving us into a new pre-game lobby.
    LobbyEntry,
    /// Someone joined the pre-game lobby (`Name has joined (3/8)!`).
    LobbyJoin {
        /// Joining player.
        name: String,
    },
    /// The match has started.
    GameStart,
    /// Our team won.
    Victory,
    /// Our team lost.
    Defeat,
    /// We were eliminated for good.
    SelfEliminated,
    /// A player was finally killed and is out of the match.
    FinalKill {
        /// Eliminated player.
        victim: String,
    },
    /// A bed was destroyed.
    BedDestroyed {
        /// It was our bed.
        own: bool,
    },
}

const LOBBY_ENTRY: &str = "Sending you to mini";
const JOIN_SUFFIX: &str = " has joined (";
const GAME_START: &str = "Protect your bed and destroy the enemy beds";
const VICTORY: &str = "VICTORY!";
const DEFEAT: &str = "GAME OVER!";
const SELF_ELIMINATED: &str = "You have been eliminated!";
const FINAL_KILL: &str = "FINAL KILL!";
const BED_DESTRUCTION: &str = "BED DESTRUCTION >";
const OWN_BED: &str = "Your Bed";

/// Classifies one raw chat line.
pub fn classify(raw: &str) -> Option<ChatSignal> {
    let line = strip_formatting(raw);
    let line = line.trim();

    if line.starts_with(LOBBY_ENTRY) {
        return Some(ChatSignal::LobbyEntry);
    }
    if let Some((name, _)) = line.split_once(JOIN_SUFFIX)
        && is_player_name(name)
    {
        return Some(ChatSignal::LobbyJoin {
            name: name.to_string(),
        });
    }
    if line.starts_with(GAME_START) {
        return Some(ChatSignal::GameStart);
    }
    if line.starts_with(VICTORY) {
        return Some(ChatSignal::Victory);
    }
    if line.starts_with(DEFEAT) {
        return Some(ChatSignal::Defeat);
    }
    if line.starts_with(SELF_ELIMINATED) {
        return Some(ChatSignal::SelfEliminated);
    }
    if let Some(rest) = line.strip_prefix(BED_DESTRUCTION) {
        return Some(ChatSignal::BedDestroyed {
            own: rest.trim_start().starts_with(OWN_BED),
        });
    }
    if line.ends_with(FINAL_KILL) {
        let victim = line.split_whitespace().next()?;
        if is_player_name(victim) {
            return Some(ChatSignal::FinalKill {
                victim: victim.to_string(),
            });
        }
    }
    None
}

/// Account names are 1–16 characters of letters, digits and underscores.
fn is_player_name(name: &str) -> bool {
    (1..=16).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lobby_markers() {
        assert_eq!(
            classify("Sending you to mini123AB!"),
            Some(ChatSignal::LobbyEntry)
        );
        assert_eq!(
            classify("§7Steve_01 §ehas joined (§b3§e/§b8§e)!"),
            Some(ChatSignal::LobbyJoin {
                name: "Steve_01".to_string()
            })
        );
    }

    #[test]
    fn test_chat_message_is_not_a_join() {
        // A player typing the phrase must not register as a join.
        assert_eq!(classify("[VIP] Steve: lol he has joined (again)"), None);
    }

    #[test]
    fn test_game_start_and_end_markers() {
        assert_eq!(
            classify("     §f§lProtect your bed and destroy the enemy beds."),
            Some(ChatSignal::GameStart)
        );
        assert_eq!(classify("§6§lVICTORY!"), Some(ChatSignal::Victory));
        assert_eq!(classify("§c§lGAME OVER!"), Some(ChatSignal::Defeat));
        assert_eq!(
            classify("You have been eliminated!"),
            Some(ChatSignal::SelfEliminated)
        );
    }

    #[test]
    fn test_quoted_start_banner_is_not_a_start() {
        assert_eq!(
            classify("[MVP+] Steve: Protect your bed and destroy the enemy beds lol"),
            None
        );
    }

    #[test]
    fn test_final_kill_victim() {
        assert_eq!(
            classify("§cAlex §7was knocked into the void by §9Bob§7. §b§lFINAL KILL!"),
            Some(ChatSignal::FinalKill {
                victim: "Alex".to_string()
            })
        );
    }

    #[test]
    fn test_bed_destruction_ownership() {
        assert_eq!(
            classify("§f§lBED DESTRUCTION > §7Your Bed was destroyed by §cAlex§7!"),
            Some(ChatSignal::BedDestroyed { own: true })
        );
        assert_eq!(
            classify("BED DESTRUCTION > Blue Bed was iced by Bob!"),
            Some(ChatSignal::BedDestroyed { own: false })
        );
    }

    #[test]
    fn test_unrelated_line() {
        assert_eq!(classify("+5 Coins!"), None);
        assert_eq!(classify(""), None);
    }
}
