#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuickAction {
    pub command: &'static str,
    pub label: &'static str,
    pub prompt: &'static str,
}

pub const QUICK_ACTIONS: &[QuickAction] = &[
    QuickAction {
        command: "border",
        label: "Add Red Border",
        prompt: "Add a thick bold red border around the thumbnail",
    },
    QuickAction {
        command: "space",
        label: "Space Background",
        prompt: "Put the subject in a colorful space nebula background",
    },
    QuickAction {
        command: "glow",
        label: "Glow Effect",
        prompt: "Add a professional inner glow to the subjects",
    },
    QuickAction {
        command: "shocked",
        label: "Shocked Face",
        prompt: "Make the expression look more shocked/excited",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "upload",
        action: "upload",
    },
    CommandSpec {
        command: "replace",
        action: "replace_frame",
    },
];

/// Commands taking one selector: a 1-based position or an id.
pub(crate) const SELECTOR_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "jump",
        action: "jump_to",
    },
    CommandSpec {
        command: "show",
        action: "show_image",
    },
    CommandSpec {
        command: "load",
        action: "load_project",
    },
    CommandSpec {
        command: "delete",
        action: "delete_project",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "undo",
        action: "undo",
    },
    CommandSpec {
        command: "redo",
        action: "redo",
    },
    CommandSpec {
        command: "history",
        action: "history",
    },
    CommandSpec {
        command: "log",
        action: "log",
    },
    CommandSpec {
        command: "suggest",
        action: "suggest",
    },
    CommandSpec {
        command: "save",
        action: "save_project",
    },
    CommandSpec {
        command: "projects",
        action: "list_projects",
    },
    CommandSpec {
        command: "reset",
        action: "reset",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
];

pub(crate) const EXPORT_COMMAND: CommandSpec = CommandSpec {
    command: "export",
    action: "export",
};

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/upload <path>",
    "/replace <path>",
    "/undo",
    "/redo",
    "/jump <n>",
    "/show <turn>",
    "/history",
    "/log",
    "/suggest",
    "/border",
    "/space",
    "/glow",
    "/shocked",
    "/save",
    "/projects",
    "/load <n|id>",
    "/delete <n|id>",
    "/export <path> [standard|hd|4k] [png|jpg]",
    "/reset",
    "/quit",
];
