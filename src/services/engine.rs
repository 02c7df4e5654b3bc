//! Session engine: the single owner of round state.
//!
//! Every transition runs on the caller's task, one at a time. Pauses between
//! round events are queued on a [`Scheduler`] and run from [`SessionEngine::tick`],
//! so inbound chat keeps flowing while a pause is pending.

use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use rand::{SeedableRng, rngs::StdRng};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    config::TriviaSettings,
    dao::{models::RoundEntity, question_bank::QuestionBank},
    error::EngineError,
    services::{
        backup::BackupRecovery,
        commands::ChatCommand,
        hints::{HintGenerator, MAX_HINT_LEVEL},
        ledger::ScoreLedger,
        matcher::AnswerMatcher,
        quiz_builder::build_quiz_set,
        timer::{Scheduler, TimerAction},
    },
    state::{
        round::{BASE_POINT_VALUE, Question, QuizSet, RoundState},
        state_machine::{RoundEvent, RoundPhase, RoundStateMachine},
    },
};

/// Places announced on leaderboards.
const PLACES: [&str; 3] = ["1st", "2nd", "3rd"];
/// Pause between the end-of-round notice and the results.
const RESULTS_DELAY: Duration = Duration::from_secs(2);
/// Pause between the results and the closing message.
const CLOSING_DELAY: Duration = Duration::from_secs(3);
const CLOSING_MESSAGE: &str = "Thanks for playing! See you next time!";

/// What the poll loop should do after an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineControl {
    /// Keep polling.
    Continue,
    /// An admin asked the bot to shut down.
    Shutdown,
}

/// Round events waiting for their pause to elapse.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Deferred {
    /// Ask the question at the current index.
    AskNext,
    /// Move past the closed question, then ask the next one.
    Advance,
    /// Send a line to chat.
    Announce(String),
}

/// State machine driving one trivia round at a time.
pub struct SessionEngine {
    settings: TriviaSettings,
    admins: HashSet<String>,
    bank: Arc<QuestionBank>,
    machine: RoundStateMachine,
    round: RoundState,
    quiz: QuizSet,
    ledger: ScoreLedger,
    backups: BackupRecovery,
    matcher: AnswerMatcher,
    hints: HintGenerator,
    scheduler: Scheduler<Deferred>,
    outbound: mpsc::UnboundedSender<String>,
    rng: StdRng,
}

impl SessionEngine {
    /// Build an idle engine sending its announcements to `outbound`.
    pub fn new(
        settings: TriviaSettings,
        admins: HashSet<String>,
        bank: Arc<QuestionBank>,
        ledger: ScoreLedger,
        backups: BackupRecovery,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Self {
        let matcher = AnswerMatcher::new(settings.match_policy);
        info!(policy = ?matcher.policy(), "answer matching policy");
        Self {
            settings,
            admins,
            bank,
            machine: RoundStateMachine::new(),
            round: RoundState::default(),
            quiz: QuizSet::default(),
            ledger,
            backups,
            matcher,
            hints: HintGenerator,
            scheduler: Scheduler::new(),
            outbound,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Replace the random source used for sampling and hints.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Current phase of the round.
    pub fn phase(&self) -> RoundPhase {
        self.machine.phase()
    }

    /// Whether a round is running.
    pub fn is_active(&self) -> bool {
        self.machine.phase().is_active()
    }

    /// Whether the current question accepts answers.
    pub fn is_question_open(&self) -> bool {
        self.machine.phase().is_question_open()
    }

    /// Round bookkeeping.
    pub fn round(&self) -> &RoundState {
        &self.round
    }

    /// Questions of the running round.
    pub fn quiz(&self) -> &QuizSet {
        &self.quiz
    }

    /// Score table.
    pub fn ledger(&self) -> &ScoreLedger {
        &self.ledger
    }

    /// Active answer matcher.
    pub fn matcher(&self) -> &AnswerMatcher {
        &self.matcher
    }

    fn current_question(&self) -> Option<&Question> {
        self.quiz.get(self.round.current_question_index)
    }

    fn say(&self, text: impl Into<String>) {
        if self.outbound.send(text.into()).is_err() {
            warn!("chat writer closed; dropping outbound message");
        }
    }

    // ---------------------------------------------------------------------
    // Poll loop entry points
    // ---------------------------------------------------------------------

    /// Run due deferred events, then evaluate the deadlines of the open question.
    pub async fn tick(&mut self, now: Instant) {
        if self.is_question_open() && self.round.current_question_index >= self.quiz.len() {
            warn!(
                index = self.round.current_question_index,
                questions = self.quiz.len(),
                "question index past the quiz set; ending round"
            );
            let res = self.end_round(now).await;
            self.log_failure("end round", res);
        }

        while let Some(event) = self.scheduler.pop_due(now) {
            self.run_deferred(now, event).await;
        }

        if !self.is_question_open() {
            return;
        }
        let Some(asked_at) = self.round.question_asked_at else {
            return;
        };

        match self
            .settings
            .deadlines
            .evaluate(asked_at, now, self.round.hints_revealed)
        {
            Some(TimerAction::Skip) => {
                let res = self.skip_question(now);
                self.log_failure("skip question", res);
            }
            Some(TimerAction::Hint(level)) => {
                let res = self.request_hint(level);
                self.log_failure("reveal hint", res);
            }
            None => {}
        }
    }

    /// Route one chat line to a command or treat it as a candidate answer.
    pub async fn handle_message(&mut self, now: Instant, sender: &str, text: &str) -> EngineControl {
        if let Some(command) = ChatCommand::parse(text) {
            if command.requires_admin() && !self.admins.contains(sender) {
                debug!(user = %sender, ?command, "ignoring admin command from non-admin");
                return EngineControl::Continue;
            }
            info!(user = %sender, ?command, "command recognized");
            return self.run_command(now, sender, command).await;
        }

        if self.is_question_open() {
            match self.submit_candidate(now, sender, text).await {
                Ok(true) => info!(user = %sender, "answer recognized"),
                Ok(false) => {}
                Err(err) => debug!(error = %err, "candidate ignored"),
            }
        }
        EngineControl::Continue
    }

    async fn run_command(&mut self, now: Instant, sender: &str, command: ChatCommand) -> EngineControl {
        match command {
            ChatCommand::Start => {
                let res = self.start(now).await;
                self.log_failure("start", res);
            }
            ChatCommand::End => {
                if self.is_active() {
                    let res = self.end_round(now).await;
                    self.log_failure("end round", res);
                } else {
                    debug!("no round to end");
                }
            }
            ChatCommand::Next => {
                let res = self.skip_question(now);
                self.log_failure("skip question", res);
            }
            ChatCommand::Stop => {
                self.stop();
                return EngineControl::Shutdown;
            }
            ChatCommand::Score => self.announce_score(sender),
            ChatCommand::Top3 => self.announce_top_overall(),
            ChatCommand::Bonus => self.toggle_bonus(),
            ChatCommand::Backup => match self.backup().await {
                Ok(()) => self.say("Trivia progress backed up."),
                Err(err) => {
                    warn!(error = %err, "backup request failed");
                }
            },
            ChatCommand::Load => {
                if let Err(err) = self.resume(now).await {
                    self.report_resume_failure(err);
                }
            }
        }
        EngineControl::Continue
    }

    async fn run_deferred(&mut self, now: Instant, event: Deferred) {
        match event {
            Deferred::AskNext => {
                let res = self.ask_next_question(now).await;
                self.log_failure("ask question", res);
            }
            Deferred::Advance => {
                self.round.current_question_index += 1;
                self.round.clear_question();
                let res = self.ask_next_question(now).await;
                self.log_failure("ask question", res);
            }
            Deferred::Announce(text) => self.say(text),
        }
    }

    fn log_failure(&self, operation: &str, result: Result<(), EngineError>) {
        match result {
            Ok(()) => {}
            Err(EngineError::Storage(err)) => error!(operation, error = %err, "storage failure"),
            Err(err) => info!(operation, reason = %err, "operation ignored"),
        }
    }

    // ---------------------------------------------------------------------
    // Round lifecycle
    // ---------------------------------------------------------------------

    /// Begin a new round: sample the quiz set, reset session scores and
    /// schedule the first question after the configured delay.
    pub async fn start(&mut self, now: Instant) -> Result<(), EngineError> {
        if self.is_active() {
            return Err(EngineError::AlreadyActive);
        }
        self.machine.apply(RoundEvent::Start)?;

        self.say("Generating trivia questions for session...");
        self.ledger.reset_session().await;
        self.reset_position();
        self.scheduler.clear();
        self.quiz = build_quiz_set(&self.bank, self.settings.num_questions, &mut self.rng);

        info!(questions = self.quiz.len(), "trivia round started");
        self.say(format!(
            "Trivia has begun! Question Count: {}. Trivia will start in {} seconds.",
            self.quiz.len(),
            self.settings.delay.as_secs()
        ));
        self.scheduler
            .schedule_in(now, self.settings.delay, Deferred::AskNext);
        Ok(())
    }

    /// Open the question at the current index, or end the round when the quiz set is exhausted.
    pub async fn ask_next_question(&mut self, now: Instant) -> Result<(), EngineError> {
        let index = self.round.current_question_index;
        let Some(question) = self.quiz.get(index) else {
            return self.end_round(now).await;
        };
        let announcement = format!(
            "Question {}: [{}] {}",
            index + 1,
            question.category,
            question.prompt
        );
        info!(
            question = index + 1,
            prompt = %question.prompt,
            answer = question.answer().unwrap_or_default(),
            "question asked"
        );

        self.machine.apply(RoundEvent::AskQuestion)?;
        self.round.question_asked_at = Some(now);
        self.round.hints_revealed = 0;
        self.say(announcement);
        Ok(())
    }

    /// Check a candidate answer against the open question.
    ///
    /// Returns `Ok(true)` when the candidate was credited. The first match
    /// closes the question, so later candidates are rejected.
    pub async fn submit_candidate(
        &mut self,
        now: Instant,
        user: &str,
        text: &str,
    ) -> Result<bool, EngineError> {
        if !self.is_question_open() {
            return Err(EngineError::QuestionClosed);
        }
        let index = self.round.current_question_index;
        let question = self.quiz.get(index).ok_or(EngineError::QuestionClosed)?;
        if !self
            .matcher
            .matches_any(text, &question.accepted_answers, self.round.hints_revealed)
        {
            return Ok(false);
        }
        let answer = question.answer().unwrap_or_default().to_owned();

        self.machine.apply(RoundEvent::AcceptAnswer)?;
        let record = self
            .ledger
            .credit(user, self.round.current_point_value)
            .await;
        self.write_backup().await;

        self.say(format!(
            "{user} answers question #{} correctly! The answer is ** {answer} ** {user} has {} {}!",
            index + 1,
            record.session_points,
            pluralize(record.session_points, "point", "points")
        ));
        self.scheduler
            .schedule_in(now, self.settings.delay, Deferred::Advance);
        Ok(true)
    }

    /// Give up on the open question without crediting anyone.
    pub fn skip_question(&mut self, now: Instant) -> Result<(), EngineError> {
        if !self.is_question_open() {
            return Err(EngineError::QuestionClosed);
        }
        self.machine.apply(RoundEvent::Skip)?;

        match self.current_question().and_then(Question::answer) {
            Some(answer) => self.say(format!(
                "Question was not answered in time. Answer: {answer}. Skipping to next question"
            )),
            None => self.say("Question was not answered in time. Skipping to next question"),
        }
        info!(question = self.round.current_question_index + 1, "question skipped");
        self.scheduler
            .schedule_in(now, self.settings.delay, Deferred::Advance);
        Ok(())
    }

    /// Reveal hint `level`, which must be the next one for the open question.
    pub fn request_hint(&mut self, level: u8) -> Result<(), EngineError> {
        if !self.is_question_open() {
            return Err(EngineError::QuestionClosed);
        }
        let revealed = self.round.hints_revealed;
        if level > MAX_HINT_LEVEL || level != revealed + 1 {
            return Err(EngineError::HintOutOfOrder {
                requested: level,
                revealed,
            });
        }
        let answer = self
            .current_question()
            .and_then(Question::answer)
            .ok_or(EngineError::QuestionClosed)?
            .to_owned();
        let hint = self
            .hints
            .render(&answer, level, &mut self.rng)
            .ok_or(EngineError::HintOutOfOrder {
                requested: level,
                revealed,
            })?;

        self.round.hints_revealed = level;
        self.say(format!("Hint #{level}: {hint}"));
        Ok(())
    }

    /// Announce the results, award the win, clear session scores and return to idle.
    pub async fn end_round(&mut self, now: Instant) -> Result<(), EngineError> {
        if self.machine.phase() != RoundPhase::Ended {
            self.machine.apply(RoundEvent::Finish)?;
        }

        self.scheduler.clear();
        let standings = self.ledger.top_session(PLACES.len());
        let results_at = match standings.first() {
            Some(winner) => {
                self.say("Trivia is over! Calculating scores...");
                self.ledger.record_win(&winner.user).await;
                let mut message = format!(
                    "*** {} *** is the winner with {} {}!",
                    winner.user,
                    winner.points,
                    pluralize(winner.points, "point", "points")
                );
                for (place, standing) in PLACES.iter().zip(&standings).skip(1) {
                    message.push_str(&format!(
                        " {place} place: {} {} {}.",
                        standing.user,
                        standing.points,
                        pluralize(standing.points, "point", "points")
                    ));
                }
                info!(winner = %winner.user, points = winner.points, "trivia round finished");
                self.scheduler
                    .schedule_in(now, RESULTS_DELAY, Deferred::Announce(message));
                now + RESULTS_DELAY
            }
            None => {
                info!("trivia round finished without any correct answer");
                self.say("No answered questions. Results are blank.");
                now
            }
        };

        self.ledger.reset_session().await;
        if let Err(err) = self.backups.discard().await {
            warn!(error = %err, "failed to discard trivia backup");
        }

        self.reset_position();
        self.quiz = QuizSet::default();
        self.scheduler.schedule_in(
            results_at,
            CLOSING_DELAY,
            Deferred::Announce(CLOSING_MESSAGE.into()),
        );
        self.machine.apply(RoundEvent::Reset)?;
        Ok(())
    }

    /// Drop the running round without results. The backup is kept for a later resume.
    pub fn stop(&mut self) {
        if self.machine.can_apply(RoundEvent::Abort) {
            if let Err(err) = self.machine.apply(RoundEvent::Abort) {
                warn!(error = %err, "failed to abort round");
            }
            info!("trivia round stopped");
        }
        self.scheduler.clear();
        self.reset_position();
        self.quiz = QuizSet::default();
    }

    /// Forget the round position while keeping the bonus mode.
    fn reset_position(&mut self) {
        self.round = RoundState {
            current_point_value: self.round.current_point_value,
            bonus: self.round.bonus,
            ..RoundState::default()
        };
    }

    // ---------------------------------------------------------------------
    // Backup and resume
    // ---------------------------------------------------------------------

    /// Index to resume from: a closed question counts as done.
    fn resume_index(&self) -> usize {
        let index = self.round.current_question_index;
        if self.machine.phase().is_question_closed() {
            (index + 1).min(self.quiz.len())
        } else {
            index
        }
    }

    fn round_entity(&self) -> RoundEntity {
        RoundEntity {
            question_index: self.resume_index(),
            point_value: self.round.current_point_value,
            bonus: self.round.bonus,
        }
    }

    /// Snapshot the running round on demand.
    pub async fn backup(&self) -> Result<(), EngineError> {
        if !self.is_active() || self.quiz.is_empty() {
            return Err(EngineError::NotActive);
        }
        self.backups
            .save(self.round_entity(), &self.quiz, self.ledger.to_entity())
            .await?;
        Ok(())
    }

    /// Snapshot after a scoring event; failures are logged and the round goes on.
    async fn write_backup(&self) {
        if let Err(err) = self.backup().await {
            warn!(error = %err, "trivia backup NOT saved");
        }
    }

    /// Restore the last snapshot and re-ask the question at the saved index.
    pub async fn resume(&mut self, now: Instant) -> Result<(), EngineError> {
        if self.is_active() {
            return Err(EngineError::AlreadyActive);
        }
        let restored = self.backups.load().await?;
        self.machine.apply(RoundEvent::Resume)?;

        self.scheduler.clear();
        self.quiz = restored.quiz;
        self.round = restored.round;
        self.ledger.restore(restored.scores).await;

        let index = self.round.current_question_index;
        info!(question = index + 1, questions = self.quiz.len(), "trivia round resumed");
        if index >= self.quiz.len() {
            self.say("Trivia resumed from backup after the last question. Wrapping up the round.");
            return self.end_round(now).await;
        }
        self.say(format!(
            "Trivia resumed from backup at question {} of {}.",
            index + 1,
            self.quiz.len()
        ));
        self.ask_next_question(now).await
    }

    fn report_resume_failure(&self, err: EngineError) {
        match err {
            EngineError::AlreadyActive => {
                self.say("Trivia is already active. End or stop it before loading a backup.")
            }
            EngineError::NoBackup => self.say("No trivia backup found."),
            other => {
                error!(error = %other, "failed to resume trivia");
                self.say("Trivia backup could not be loaded.");
            }
        }
    }

    // ---------------------------------------------------------------------
    // Open commands
    // ---------------------------------------------------------------------

    fn announce_score(&self, user: &str) {
        match self.ledger.get(user) {
            Some(record) => self.say(format!(
                "{user} has {} {} for this trivia session, {} total {} and {} total {}.",
                record.session_points,
                pluralize(record.session_points, "point", "points"),
                record.overall_points,
                pluralize(record.overall_points, "point", "points"),
                record.wins,
                pluralize(record.wins, "win", "wins"),
            )),
            None => self.say(format!("{user} not found in database.")),
        }
    }

    fn announce_top_overall(&self) {
        let standings = self.ledger.top_overall(PLACES.len());
        if standings.is_empty() {
            self.say("No scores yet.");
            return;
        }
        let message = PLACES
            .iter()
            .zip(&standings)
            .map(|(place, standing)| {
                format!(
                    "{place} place: {} {} {} | {} {}.",
                    standing.user,
                    standing.wins,
                    pluralize(standing.wins, "match", "matches"),
                    standing.points,
                    pluralize(standing.points, "point", "points"),
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        self.say(message);
    }

    /// Flip the bonus mode and the per-question point value with it.
    pub fn toggle_bonus(&mut self) {
        self.round.bonus = !self.round.bonus;
        if self.round.bonus {
            self.round.current_point_value = self.settings.bonus_value;
            self.say(format!(
                "Bonus round activated! Each question is now worth {} points.",
                self.settings.bonus_value
            ));
        } else {
            self.round.current_point_value = BASE_POINT_VALUE;
            self.say("Bonus round deactivated. Each question is now worth 1 point.");
        }
        info!(
            bonus = self.round.bonus,
            point_value = self.round.current_point_value,
            "bonus mode toggled"
        );
    }
}

fn pluralize<'a>(count: u32, singular: &'a str, plural: &'a str) -> &'a str {
    if count == 1 { singular } else { plural }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pluralize_uses_singular_for_one_only() {
        assert_eq!(pluralize(1, "point", "points"), "point");
        assert_eq!(pluralize(0, "point", "points"), "points");
        assert_eq!(pluralize(3, "match", "matches"), "matches");
    }
}
