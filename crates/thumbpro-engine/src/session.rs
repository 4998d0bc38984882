use thumbpro_contracts::chat::conversation::{FRESH_START_GREETING, GREETING};
use thumbpro_contracts::chat::{ConversationLog, Role};
use thumbpro_contracts::events::{CursorMove, EventWriter, SessionEvent};
use thumbpro_contracts::history::{Version, VersionHistory, VersionSource};
use thumbpro_contracts::projects::{Project, ProjectLibrary};
use thumbpro_contracts::{now_utc_iso, unix_epoch_millis, EditorError, ImageRef};
use uuid::Uuid;

use crate::gateway::{suggest_or_fallback, EditGateway, EditRequest, EditResult, SuggestionRequest};
use crate::transform::{self, ExportFormat, ExportTier};

pub const DEFAULT_EDIT_PROMPT: &str = "enhance this for a youtube thumbnail";
const UPLOADED_REPLY: &str =
    "Image uploaded! What changes should I make to turn this into a viral thumbnail?";
const REPLACED_REPLY: &str =
    "Source frame replaced. Your undo history is unchanged; what should I do with it?";

/// Whether a finished upload grows history or overwrites the frame on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    Append,
    Replace,
}

/// An edit in flight, carrying the input captured when it was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub id: String,
    pub prompt: String,
    pub source: Option<ImageRef>,
    pub source_version_id: Option<String>,
    pub issued_at: String,
}

impl PendingRequest {
    pub fn edit_request(&self) -> EditRequest {
        EditRequest {
            prompt: self.prompt.clone(),
            source_image: self.source.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

/// One editing session: the only writer of its history and conversation.
pub struct EditorSession {
    session_id: String,
    history: VersionHistory,
    conversation: ConversationLog,
    pending: Option<PendingRequest>,
    last_error: Option<EditorError>,
    events: Option<EventWriter>,
    version_seq: u64,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            history: VersionHistory::new(),
            conversation: ConversationLog::with_greeting(GREETING),
            pending: None,
            last_error: None,
            events: None,
            version_seq: 0,
        }
    }

    /// Records every state change to `events` as JSONL.
    pub fn with_events(events: EventWriter) -> Self {
        let mut session = Self::new();
        session.session_id = events.session_id().to_string();
        session.events = Some(events);
        session.emit(SessionEvent::SessionStarted);
        session
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn history(&self) -> &VersionHistory {
        &self.history
    }

    pub fn conversation(&self) -> &ConversationLog {
        &self.conversation
    }

    pub fn current(&self) -> Option<&Version> {
        self.history.current()
    }

    pub fn pending(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn last_error(&self) -> Option<&EditorError> {
        self.last_error.as_ref()
    }

    /// Normalizes a user file to 16:9 and admits it per `mode`.
    pub fn upload(&mut self, bytes: &[u8], mode: UploadMode) -> Result<Version, EditorError> {
        let image = match transform::normalize_upload(bytes) {
            Ok(image) => image,
            Err(err) => return Err(self.record_error(err)),
        };
        let version = self.next_version(image, VersionSource::Upload);
        match mode {
            UploadMode::Append => {
                self.history.append(version.clone());
                self.conversation.push_assistant(UPLOADED_REPLY, None);
                self.emit(self.version_event(&version, false));
            }
            UploadMode::Replace => {
                self.history.replace(version.clone());
                self.conversation.push_assistant(REPLACED_REPLY, None);
                self.emit(self.version_event(&version, true));
            }
        }
        Ok(version)
    }

    /// Issues an edit against whatever is on screen right now.
    pub fn begin_edit(&mut self, input: &str) -> Result<PendingRequest, EditorError> {
        if self.pending.is_some() {
            return Err(EditorError::EditInFlight);
        }
        let trimmed = input.trim();
        let source = self.history.current().cloned();
        if trimmed.is_empty() && source.is_none() {
            return Err(EditorError::NothingToEdit);
        }

        let prompt = if trimmed.is_empty() {
            DEFAULT_EDIT_PROMPT.to_string()
        } else {
            trimmed.to_string()
        };
        self.conversation.push_user(&prompt);
        self.last_error = None;

        let request = PendingRequest {
            id: Uuid::new_v4().to_string(),
            prompt,
            source_version_id: source.as_ref().map(|version| version.id.clone()),
            source: source.map(|version| version.image),
            issued_at: now_utc_iso(),
        };
        self.pending = Some(request.clone());
        self.emit(SessionEvent::EditStarted {
            request_id: request.id.clone(),
            prompt: request.prompt.clone(),
            source_version_id: request.source_version_id.clone(),
        });
        Ok(request)
    }

    /// Folds a finished request into the history as it stands now.
    ///
    /// Success appends on top of the current cursor, whatever it has become since
    /// the request was issued; the frame is first held to 16:9. Failure leaves
    /// history and conversation untouched.
    pub fn complete_edit(
        &mut self,
        request: PendingRequest,
        outcome: Result<EditResult, EditorError>,
    ) -> Result<Version, EditorError> {
        if self.pending.as_ref().map(|pending| pending.id.as_str()) != Some(request.id.as_str()) {
            return Err(EditorError::UnknownRequest(request.id));
        }
        self.pending = None;

        let outcome = outcome.and_then(|result| {
            let image = transform::normalize_result(&result.image)?;
            Ok(EditResult { image, ..result })
        });
        match outcome {
            Ok(result) => {
                let version = self.next_version(
                    result.image.clone(),
                    VersionSource::Edit {
                        prompt: request.prompt.clone(),
                    },
                );
                self.history.append(version.clone());
                self.conversation
                    .push_assistant(&result.caption, Some(result.image));
                self.emit(SessionEvent::EditCompleted {
                    request_id: request.id,
                    version_id: version.id.clone(),
                    source_version_id: request.source_version_id,
                });
                self.emit(self.version_event(&version, false));
                Ok(version)
            }
            Err(err) => {
                self.emit(SessionEvent::EditFailed {
                    request_id: request.id,
                    error: err.to_string(),
                });
                Err(self.record_error(err))
            }
        }
    }

    /// Issue, call, and complete in one go.
    pub fn run_edit(
        &mut self,
        gateway: &dyn EditGateway,
        input: &str,
    ) -> Result<Version, EditorError> {
        let request = self.begin_edit(input)?;
        let outcome = gateway.edit_or_generate(&request.edit_request());
        self.complete_edit(request, outcome)
    }

    pub fn undo(&mut self) -> bool {
        let moved = self.history.undo();
        self.emit_cursor(moved, CursorMove::Undo);
        moved
    }

    pub fn redo(&mut self) -> bool {
        let moved = self.history.redo();
        self.emit_cursor(moved, CursorMove::Redo);
        moved
    }

    pub fn jump_to(&mut self, index: usize) -> bool {
        let moved = self.history.jump_to(index);
        self.emit_cursor(moved, CursorMove::Jump);
        moved
    }

    /// Puts a conversation image back on the canvas.
    ///
    /// An image still in history is a jump; one that is gone (discarded branch or
    /// replaced slot) is appended so the cursor always marks what is shown.
    /// Returns the resulting cursor, or `None` when the turn has no image.
    pub fn show_image(&mut self, turn_id: &str) -> Option<usize> {
        let image = self.conversation.get(turn_id)?.image.clone()?;
        match self.history.position_of(&image) {
            Some(index) => {
                self.jump_to(index);
            }
            None => {
                let prompt = self.prompt_for_turn(turn_id);
                let version = self.next_version(image, VersionSource::Edit { prompt });
                self.history.append(version.clone());
                self.emit(self.version_event(&version, false));
            }
        }
        self.history.cursor()
    }

    pub fn suggest_next_edits(&self, gateway: &dyn EditGateway) -> Vec<String> {
        let request = SuggestionRequest {
            last_prompt: self.conversation.last_user_text().map(str::to_string),
            current_image: self.history.current().map(|version| version.image.clone()),
        };
        suggest_or_fallback(gateway, &request)
    }

    /// Snapshots the current frame into the gallery.
    pub fn save_project(&self, library: &mut ProjectLibrary) -> Option<Project> {
        let image = self.history.current()?.image.clone();
        let project = library.save(image);
        self.emit(SessionEvent::ProjectSaved {
            project_id: project.id.clone(),
            name: project.name.clone(),
        });
        Some(project)
    }

    /// Replaces the whole history with the project's snapshot.
    pub fn load_project(&mut self, library: &ProjectLibrary, project: &Project) {
        self.history = library.load(project);
        self.conversation
            .push_assistant(&format!("Loaded project \"{}\".", project.name), None);
        self.emit(SessionEvent::ProjectLoaded {
            project_id: project.id.clone(),
            cursor: self.history.cursor(),
        });
    }

    pub fn export(
        &self,
        tier: ExportTier,
        format: ExportFormat,
    ) -> Result<ExportedImage, EditorError> {
        let current = self.history.current().ok_or(EditorError::NothingToEdit)?;
        let decoded = transform::decode_image_ref(&current.image)?;
        let (width, height) = tier.dims();
        let bytes = transform::resize(&decoded, width, height, format)?;
        Ok(ExportedImage {
            bytes,
            mime: format.mime(),
            file_name: format!("thumbnail-{}.{}", unix_epoch_millis(), format.extension()),
            width,
            height,
        })
    }

    /// Clears history and conversation. Refused while an edit is in flight.
    pub fn reset(&mut self) -> Result<(), EditorError> {
        if self.pending.is_some() {
            return Err(EditorError::EditInFlight);
        }
        self.history = VersionHistory::new();
        self.conversation = ConversationLog::with_greeting(FRESH_START_GREETING);
        self.last_error = None;
        self.emit(SessionEvent::SessionReset);
        Ok(())
    }

    fn next_version(&mut self, image: ImageRef, source: VersionSource) -> Version {
        self.version_seq += 1;
        Version::new(image, source, self.version_seq)
    }

    fn prompt_for_turn(&self, turn_id: &str) -> String {
        let turns = self.conversation.turns();
        turns
            .iter()
            .position(|turn| turn.id == turn_id)
            .and_then(|index| {
                turns[..index]
                    .iter()
                    .rev()
                    .find(|turn| turn.role == Role::User && !turn.text.is_empty())
            })
            .map(|turn| turn.text.clone())
            .unwrap_or_default()
    }

    fn record_error(&mut self, err: EditorError) -> EditorError {
        tracing::warn!(error = %err, "edit session error");
        self.last_error = Some(err.clone());
        err
    }

    fn emit_cursor(&self, moved: bool, via: CursorMove) {
        if moved {
            self.emit(SessionEvent::CursorMoved {
                via,
                cursor: self.history.cursor(),
                versions: self.history.len(),
            });
        }
    }

    fn version_event(&self, version: &Version, replaced: bool) -> SessionEvent {
        let version_id = version.id.clone();
        let cursor = self.history.cursor();
        let versions = self.history.len();
        if replaced {
            SessionEvent::VersionReplaced {
                version_id,
                cursor,
                versions,
            }
        } else {
            SessionEvent::VersionAppended {
                version_id,
                cursor,
                versions,
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        let kind = event.kind();
        tracing::debug!(event = kind, status = %self.history.status_label(), "session event");
        let Some(events) = self.events.as_ref() else {
            return;
        };
        if let Err(err) = events.emit(event) {
            tracing::warn!(error = %format!("{err:#}"), event = kind, "event log write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::Mutex;

    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use thumbpro_contracts::chat::Role;
    use thumbpro_contracts::events::{read_events, CursorMove, EventWriter, SessionEvent};
    use thumbpro_contracts::projects::{MemoryProjectStore, ProjectLibrary};
    use thumbpro_contracts::{EditorError, ImageRef};

    use super::{EditorSession, UploadMode, DEFAULT_EDIT_PROMPT};
    use crate::gateway::{EditGateway, EditRequest, EditResult, SuggestionRequest};
    use crate::transform::{decode_image, ExportFormat, ExportTier};

    /// Replays queued outcomes and remembers what it was asked.
    struct ScriptedGateway {
        outcomes: Mutex<VecDeque<Result<EditResult, EditorError>>>,
        seen: Mutex<Vec<EditRequest>>,
    }

    impl ScriptedGateway {
        fn new(outcomes: Vec<Result<EditResult, EditorError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<EditRequest> {
            self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
        }
    }

    impl EditGateway for ScriptedGateway {
        fn name(&self) -> &str {
            "scripted"
        }

        fn edit_or_generate(&self, request: &EditRequest) -> Result<EditResult, EditorError> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(request.clone());
            }
            self.outcomes
                .lock()
                .ok()
                .and_then(|mut outcomes| outcomes.pop_front())
                .unwrap_or_else(|| Err(EditorError::no_image_returned()))
        }

        fn suggest_next_edits(&self, request: &SuggestionRequest) -> anyhow::Result<Vec<String>> {
            match request.last_prompt.as_deref() {
                Some(prompt) => Ok(vec![format!("More {prompt}")]),
                None => anyhow::bail!("no context"),
            }
        }
    }

    fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let mut image = RgbImage::new(width, height);
        for pixel in image.pixels_mut() {
            *pixel = Rgb(rgb);
        }
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap_or_default();
        bytes
    }

    fn result(label: &str) -> EditResult {
        EditResult {
            image: ImageRef::from_bytes("image/png", &png_bytes(16, 9, [label.len() as u8, 7, 9])),
            caption: format!("{label} done"),
        }
    }

    fn current_image(session: &EditorSession) -> Option<ImageRef> {
        session.current().map(|version| version.image.clone())
    }

    #[test]
    fn glow_then_undo_then_border_discards_glow() -> anyhow::Result<()> {
        let mut session = EditorSession::new();
        assert_eq!(session.history().cursor(), None);
        assert_eq!(session.history().len(), 0);

        let upload = session.upload(&png_bytes(800, 600, [10, 20, 30]), UploadMode::Append)?;
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history().cursor(), Some(0));
        assert_eq!(decode_image(&upload.image.decode()?)?.width(), 1280);

        let glow = result("glow");
        let request = session.begin_edit("add glow")?;
        assert!(session.is_loading());
        assert_eq!(request.source.as_ref(), Some(&upload.image));
        session.complete_edit(request, Ok(glow.clone()))?;
        assert!(!session.is_loading());
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history().cursor(), Some(1));

        assert!(session.undo());
        assert_eq!(session.history().cursor(), Some(0));
        assert_eq!(current_image(&session), Some(upload.image.clone()));

        let border = result("border!");
        let request = session.begin_edit("add border")?;
        assert_eq!(request.source.as_ref(), Some(&upload.image));
        session.complete_edit(request, Ok(border.clone()))?;

        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history().cursor(), Some(1));
        assert_eq!(current_image(&session), Some(border.image));
        assert!(session.history().position_of(&glow.image).is_none());
        Ok(())
    }

    #[test]
    fn completion_applies_to_moved_cursor_with_captured_source() -> anyhow::Result<()> {
        let mut session = EditorSession::new();
        let first = session.upload(&png_bytes(64, 36, [1, 1, 1]), UploadMode::Append)?;
        let second = session.upload(&png_bytes(64, 36, [2, 2, 2]), UploadMode::Append)?;

        let request = session.begin_edit("add glow")?;
        assert_eq!(request.source.as_ref(), Some(&second.image));
        assert_eq!(request.source_version_id.as_deref(), Some(second.id.as_str()));

        // User navigates while the request is in flight.
        assert!(session.undo());
        assert_eq!(session.begin_edit("again").err(), Some(EditorError::EditInFlight));

        let glow = result("glow");
        session.complete_edit(request, Ok(glow.clone()))?;
        let images: Vec<ImageRef> = session
            .history()
            .versions()
            .iter()
            .map(|version| version.image.clone())
            .collect();
        assert_eq!(images, vec![first.image, glow.image]);
        assert_eq!(session.history().cursor(), Some(1));
        Ok(())
    }

    #[test]
    fn gateway_failure_leaves_history_and_conversation_untouched() -> anyhow::Result<()> {
        let mut session = EditorSession::new();
        session.upload(&png_bytes(32, 18, [5, 5, 5]), UploadMode::Append)?;
        let gateway = ScriptedGateway::new(vec![Err(EditorError::RateLimited)]);

        let before_history = session.history().clone();
        let err = session.run_edit(&gateway, "add glow").err();
        assert_eq!(err, Some(EditorError::RateLimited));
        assert_eq!(session.history(), &before_history);
        assert_eq!(session.last_error(), Some(&EditorError::RateLimited));
        assert!(!session.is_loading());

        let last = session.conversation().turns().last().cloned();
        assert_eq!(last.as_ref().map(|turn| turn.role), Some(Role::User));
        assert_eq!(last.map(|turn| turn.text), Some("add glow".to_string()));

        // The next submission clears the surfaced error.
        session.begin_edit("retry")?;
        assert!(session.last_error().is_none());
        Ok(())
    }

    #[test]
    fn assistant_images_match_appended_versions() -> anyhow::Result<()> {
        let mut session = EditorSession::new();
        let gateway = ScriptedGateway::new(vec![Ok(result("a")), Ok(result("bb"))]);
        session.run_edit(&gateway, "neon city")?;
        session.run_edit(&gateway, "")?;

        let seen = gateway.seen();
        assert_eq!(seen[0].source_image, None);
        assert_eq!(seen[1].prompt, DEFAULT_EDIT_PROMPT);
        assert_eq!(seen[1].source_image, Some(result("a").image));

        let turn_images: Vec<ImageRef> = session
            .conversation()
            .turns()
            .iter()
            .filter(|turn| turn.role == Role::Assistant)
            .filter_map(|turn| turn.image.clone())
            .collect();
        let version_images: Vec<ImageRef> = session
            .history()
            .versions()
            .iter()
            .map(|version| version.image.clone())
            .collect();
        assert_eq!(turn_images, version_images);
        Ok(())
    }

    #[test]
    fn blank_prompt_without_image_is_rejected() {
        let mut session = EditorSession::new();
        assert_eq!(session.begin_edit("   ").err(), Some(EditorError::NothingToEdit));
        assert_eq!(session.conversation().len(), 1);
    }

    #[test]
    fn stale_request_is_rejected_without_mutation() -> anyhow::Result<()> {
        let mut session = EditorSession::new();
        let request = session.begin_edit("gaming setup")?;
        let mut forged = request.clone();
        forged.id = "someone-else".to_string();

        let err = session.complete_edit(forged, Ok(result("x"))).err();
        assert!(matches!(err, Some(EditorError::UnknownRequest(_))));
        assert!(session.is_loading());
        assert!(session.history().is_empty());

        session.complete_edit(request, Ok(result("x")))?;
        assert_eq!(session.history().len(), 1);
        Ok(())
    }

    #[test]
    fn replace_upload_overwrites_without_new_undo_step() -> anyhow::Result<()> {
        let mut session = EditorSession::new();
        session.upload(&png_bytes(64, 36, [1, 0, 0]), UploadMode::Append)?;
        session.upload(&png_bytes(64, 36, [0, 1, 0]), UploadMode::Append)?;
        session.undo();

        let replacement = session.upload(&png_bytes(64, 36, [0, 0, 1]), UploadMode::Replace)?;
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history().cursor(), Some(0));
        assert_eq!(current_image(&session), Some(replacement.image));
        assert!(!session.undo());
        Ok(())
    }

    #[test]
    fn bad_upload_surfaces_transform_error() {
        let mut session = EditorSession::new();
        let err = session.upload(b"not an image", UploadMode::Append).err();
        assert!(matches!(err, Some(EditorError::TransformFailed(_))));
        assert!(session.history().is_empty());
        assert!(matches!(session.last_error(), Some(EditorError::TransformFailed(_))));
    }

    #[test]
    fn showing_a_log_image_jumps_or_restores_it() -> anyhow::Result<()> {
        let mut session = EditorSession::new();
        let gateway =
            ScriptedGateway::new(vec![Ok(result("a")), Ok(result("bb")), Ok(result("ccc"))]);
        session.run_edit(&gateway, "first")?;
        session.run_edit(&gateway, "second")?;

        let first_turn = session
            .conversation()
            .turns()
            .iter()
            .find(|turn| turn.image == Some(result("a").image))
            .map(|turn| turn.id.clone())
            .unwrap_or_default();
        assert_eq!(session.show_image(&first_turn), Some(0));
        assert_eq!(session.history().len(), 2);

        // Branch discard drops "second"; showing it again appends it back.
        session.run_edit(&gateway, "third")?;
        let second_turn = session
            .conversation()
            .turns()
            .iter()
            .find(|turn| turn.image == Some(result("bb").image))
            .map(|turn| turn.id.clone())
            .unwrap_or_default();
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.show_image(&second_turn), Some(2));
        assert_eq!(
            session.current().and_then(|version| version.prompt()),
            Some("second")
        );

        let greeting = session.conversation().turns()[0].id.clone();
        assert_eq!(session.show_image(&greeting), None);
        Ok(())
    }

    #[test]
    fn suggestions_use_last_prompt_or_fall_back() -> anyhow::Result<()> {
        let mut session = EditorSession::new();
        let gateway = ScriptedGateway::new(vec![Ok(result("a"))]);
        assert_eq!(session.suggest_next_edits(&gateway).len(), 6);

        session.run_edit(&gateway, "glow")?;
        assert_eq!(session.suggest_next_edits(&gateway), vec!["More glow"]);
        Ok(())
    }

    #[test]
    fn save_delete_and_load_projects() -> anyhow::Result<()> {
        let mut session = EditorSession::new();
        let mut library = ProjectLibrary::open(MemoryProjectStore::new());
        assert!(session.save_project(&mut library).is_none());

        let gateway = ScriptedGateway::new(vec![Ok(result("a")), Ok(result("bb"))]);
        session.run_edit(&gateway, "one")?;
        session.run_edit(&gateway, "two")?;
        let project = session
            .save_project(&mut library)
            .ok_or_else(|| anyhow::anyhow!("no project"))?;
        assert_eq!(library.len(), 1);

        session.undo();
        session.load_project(&library, &project);
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history().cursor(), Some(0));
        assert_eq!(current_image(&session), Some(result("bb").image));
        assert!(!session.redo());

        assert!(library.delete(&project.id));
        assert!(library.is_empty());
        Ok(())
    }

    #[test]
    fn export_scales_current_frame_to_tier() -> anyhow::Result<()> {
        let mut session = EditorSession::new();
        assert_eq!(
            session.export(ExportTier::Hd, ExportFormat::Png).err(),
            Some(EditorError::NothingToEdit)
        );
        session.upload(&png_bytes(400, 300, [9, 9, 9]), UploadMode::Append)?;

        let exported = session.export(ExportTier::Hd, ExportFormat::Jpeg { quality: 85 })?;
        assert_eq!((exported.width, exported.height), (1920, 1080));
        assert_eq!(exported.mime, "image/jpeg");
        assert!(exported.file_name.starts_with("thumbnail-"));
        assert!(exported.file_name.ends_with(".jpg"));
        assert_eq!(decode_image(&exported.bytes)?.height(), 1080);
        Ok(())
    }

    #[test]
    fn reset_waits_for_pending_edit() -> anyhow::Result<()> {
        let mut session = EditorSession::new();
        let request = session.begin_edit("neon")?;
        assert_eq!(session.reset().err(), Some(EditorError::EditInFlight));
        session.complete_edit(request, Ok(result("n")))?;

        session.reset()?;
        assert!(session.history().is_empty());
        assert_eq!(session.conversation().len(), 1);
        assert_eq!(
            session.conversation().turns()[0].text,
            "Let's start fresh. What's your new video about?"
        );
        Ok(())
    }

    #[test]
    fn session_events_are_logged_in_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let mut session = EditorSession::with_events(EventWriter::new(&path, "session-1"));
        let gateway = ScriptedGateway::new(vec![
            Ok(result("a")),
            Ok(result("bb")),
            Err(EditorError::RateLimited),
        ]);
        session.run_edit(&gateway, "one")?;
        session.run_edit(&gateway, "two")?;
        let _ = session.run_edit(&gateway, "three");
        assert!(session.undo());
        assert!(!session.undo());

        let records = read_events(&path)?;
        let kinds: Vec<&str> = records.iter().map(|record| record.event.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "session_started",
                "edit_started",
                "edit_completed",
                "version_appended",
                "edit_started",
                "edit_completed",
                "version_appended",
                "edit_started",
                "edit_failed",
                "cursor_moved",
            ]
        );
        assert_eq!(
            records.last().map(|record| record.event.clone()),
            Some(SessionEvent::CursorMoved {
                via: CursorMove::Undo,
                cursor: Some(0),
                versions: 2,
            })
        );
        assert!(matches!(
            &records[8].event,
            SessionEvent::EditFailed { error, .. } if error == "Too many requests. Please wait a moment."
        ));
        assert_eq!(session.session_id(), "session-1");
        Ok(())
    }

    #[test]
    fn off_ratio_gateway_frame_is_cropped_to_widescreen() -> anyhow::Result<()> {
        let mut session = EditorSession::new();
        let square = EditResult {
            image: ImageRef::from_bytes("image/png", &png_bytes(1000, 1000, [40, 80, 120])),
            caption: "square".to_string(),
        };
        let request = session.begin_edit("make it square")?;
        let version = session.complete_edit(request, Ok(square))?;

        let frame = decode_image(&version.image.decode()?)?;
        assert_eq!((frame.width(), frame.height()), (1280, 720));
        let shown = session.conversation().turns().last().and_then(|turn| turn.image.clone());
        assert_eq!(shown, Some(version.image));
        Ok(())
    }

    #[test]
    fn undecodable_gateway_frame_counts_as_failure() -> anyhow::Result<()> {
        let mut session = EditorSession::new();
        let broken = EditResult {
            image: ImageRef::from_bytes("image/png", b"not a png"),
            caption: "broken".to_string(),
        };
        let request = session.begin_edit("anything")?;
        let err = session.complete_edit(request, Ok(broken)).err();
        assert!(matches!(err, Some(EditorError::TransformFailed(_))));
        assert!(session.history().is_empty());
        assert!(!session.is_loading());
        Ok(())
    }

    #[test]
    fn blank_submission_logs_the_default_prompt() -> anyhow::Result<()> {
        let mut session = EditorSession::new();
        session.upload(&png_bytes(64, 36, [3, 3, 3]), UploadMode::Append)?;
        let request = session.begin_edit("   ")?;
        assert_eq!(request.prompt, DEFAULT_EDIT_PROMPT);
        assert_eq!(session.conversation().last_user_text(), Some(DEFAULT_EDIT_PROMPT));
        Ok(())
    }
}
