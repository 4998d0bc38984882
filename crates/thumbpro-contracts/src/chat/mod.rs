mod command_registry;
pub mod conversation;
mod intent_parser;

pub use command_registry::{QuickAction, CHAT_HELP_COMMANDS, QUICK_ACTIONS};
pub use conversation::{ConversationLog, ConversationTurn, Role};
pub use intent_parser::{parse_intent, Intent};
