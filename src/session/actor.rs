// session/actor.rs - Chat Session Actor

use actix::prelude::*;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, instrument, trace, warn};

use super::messages::*;
use super::transport::{ChatView, SyncTransport};
use crate::chat::{
    plan_introductions, plan_ranges, total_missing, ChatMessage, FetchId, FetchTracker,
    MessageType, MissingData, Outbox, Roster, RosterEntry, TimeoutOutcome, UNKNOWN_SENDER,
};
use crate::name::Name;
use crate::observability::{record_fetch_timeout, record_message_received};
use crate::packet::{Data, Interest, SignedObject};
use crate::protocol::{
    invitation_prefix, signer_namespace, IncomingInvitation, Invitation, InvitationReply,
    IntroCertificate, IntroRole, OutgoingInvitation, ReplyAction, TimeoutAction, ValidatedReply,
    INTRO_CERT_COMPONENT,
};
use crate::trust::{now_ms, Certificate, Contact, Identity};
use crate::validator::{Validation, ValidationFailure, ValidationRequest, Validator};

/// Per-session parameters
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub chatroom: String,

    pub nick: String,

    /// Local routing prefix, e.g. `/private/local`
    pub local_prefix: Name,

    pub broadcast_root: Name,

    /// Retries for chat data and certificate fetches
    pub fetch_retries: u32,

    pub invitation_retries: u32,

    /// Catch-up starts once this many packets are missing across all ranges
    pub catch_up_threshold: u64,

    /// Introductions fetched per sync update at most
    pub max_intro_fetches: u64,

    pub freshness_ms: u64,

    /// HELLO is sent when nothing was published for this long
    pub hello_interval_ms: u64,

    /// Roster entries silent for longer are reaped
    pub stale_after_ms: i64,
}

impl SessionSettings {
    /// `<local prefix>/<namespace>/<chatroom>`
    pub fn chat_prefix(&self, namespace: &Name, chatroom: &str) -> Name {
        self.local_prefix
            .clone()
            .append_name(namespace)
            .append(chatroom)
    }
}

/// What a validation chain was started for
#[derive(Debug)]
enum Pending {
    ChatData { data: Data, is_history: bool },
    Introduction { data: Data },
    InvitationReply { token: u64 },
    IncomingInvitation { token: u64 },
}

/// What a tracked fetch will be used for
#[derive(Debug)]
enum FetchTarget {
    ChatData { is_history: bool },
    InvitationReply { token: u64 },
    Certificate { request: ValidationRequest, pending: Pending },
}

/// One participant's membership in one chatroom
///
/// All trust and chat state lives here and is only touched from the
/// actor's own mailbox. The transport posts network completions back
/// as messages.
pub struct ChatSession {
    settings: SessionSettings,

    identity: Identity,

    validator: Validator,

    outbox: Outbox,

    roster: Roster,

    fetches: FetchTracker<FetchTarget>,

    /// Invitations we sent, by token
    outgoing: HashMap<u64, OutgoingInvitation>,

    /// Invitations we received, by token
    incoming: HashMap<u64, IncomingInvitation>,

    /// Namespaces whose introductions we accept
    introducers: HashSet<Name>,

    tokens: u64,

    /// Last time we published anything (ms)
    last_sent: i64,

    transport: Box<dyn SyncTransport>,

    view: Box<dyn ChatView>,
}

impl ChatSession {
    pub fn new(
        settings: SessionSettings,
        identity: Identity,
        validator: Validator,
        transport: impl SyncTransport + 'static,
        view: impl ChatView + 'static,
    ) -> Self {
        let chat_prefix = settings.chat_prefix(identity.namespace(), &settings.chatroom);
        let outbox = Outbox::new(
            chat_prefix,
            settings.chatroom.clone(),
            settings.nick.clone(),
            settings.freshness_ms,
        );
        let roster = Roster::new(settings.stale_after_ms);

        Self {
            settings,
            identity,
            validator,
            outbox,
            roster,
            fetches: FetchTracker::new(),
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
            introducers: HashSet::new(),
            tokens: 0,
            last_sent: 0,
            transport: Box::new(transport),
            view: Box::new(view),
        }
    }

    /// Join through an accepted invitation: trust the inviter's chat data and introductions
    pub fn with_inviter(mut self, invitation: &Invitation) -> Self {
        self.admit(
            invitation.inviter_routing_prefix.clone(),
            invitation.inviter_certificate.clone(),
            invitation.inviter_namespace(),
            IntroRole::Introducer,
        );
        self
    }

    pub fn chat_prefix(&self) -> &Name {
        self.outbox.chat_prefix()
    }

    fn next_token(&mut self) -> u64 {
        let token = self.tokens;
        self.tokens += 1;
        token
    }

    fn admit(&mut self, prefix: Name, certificate: Certificate, namespace: Name, role: IntroRole) {
        debug!(participant = %namespace, prefix = %prefix, role = role.as_str(), "Participant admitted");
        self.validator.add_chat_data_rule(prefix, certificate);
        if role == IntroRole::Introducer {
            self.introducers.insert(namespace);
        }
    }

    fn publish(&mut self, data: Data) {
        self.last_sent = now_ms();
        self.transport.publish(data);
    }

    fn announce(&mut self, msg_type: MessageType) {
        let now = now_ms();
        let built = match msg_type {
            MessageType::Join => self.outbox.join(now, &self.identity),
            MessageType::Leave => self.outbox.leave(now, &self.identity),
            _ => self.outbox.hello(now, &self.identity),
        };
        match built {
            Ok(data) => self.publish(data),
            Err(e) => warn!(error = %e, msg_type = msg_type.as_str(), "Control message not sent"),
        }
    }

    fn schedule_hello(&self, ctx: &mut Context<Self>) {
        let interval = self.settings.hello_interval_ms.max(1);
        let delay = rand::rng().random_range(interval / 2..=interval);
        ctx.run_later(Duration::from_millis(delay), |session, ctx| {
            session.on_hello_tick();
            session.schedule_hello(ctx);
        });
    }

    fn on_hello_tick(&mut self) {
        let now = now_ms();
        if now - self.last_sent >= self.settings.hello_interval_ms as i64 {
            self.announce(MessageType::Hello);
        }

        let stale = self.roster.reap_stale(now);
        if !stale.is_empty() {
            self.view.roster_changed(&stale);
        }
    }

    // =========================================================================
    // Sync pipeline
    // =========================================================================

    fn on_tree_update(&mut self, missing: Vec<MissingData>) {
        let own = self.outbox.chat_prefix().clone();
        let own_intro = IntroCertificate::sync_prefix(&own);

        let (intros, chat): (Vec<MissingData>, Vec<MissingData>) = missing
            .into_iter()
            .filter(|range| range.prefix != own && range.prefix != own_intro)
            .partition(|range| {
                range
                    .prefix
                    .get(-1)
                    .is_some_and(|c| c.as_bytes() == INTRO_CERT_COMPONENT.as_bytes())
            });

        let total = total_missing(&intros).saturating_add(total_missing(&chat));
        let catch_up = total >= self.settings.catch_up_threshold;
        if catch_up {
            debug!(total, threshold = self.settings.catch_up_threshold, "Catch-up mode");
        }

        // introductions are never skipped, only bounded
        let plans = plan_introductions(&intros, self.settings.max_intro_fetches)
            .into_iter()
            .chain(plan_ranges(&chat, catch_up));

        for plan in plans {
            let interest = Interest::new(plan.name());
            let id = self.fetches.register(
                interest.clone(),
                self.settings.fetch_retries,
                FetchTarget::ChatData { is_history: plan.is_history },
            );
            self.transport.express_interest(id, interest);
        }
    }

    fn on_data(&mut self, id: FetchId, data: Data) {
        let Some(target) = self.fetches.complete(id) else {
            trace!(%id, name = %data.name(), "Late data dropped");
            return;
        };

        match target {
            FetchTarget::ChatData { is_history } => {
                let pending = if IntroCertificate::is_intro_name(data.name()) {
                    Pending::Introduction { data: data.clone() }
                } else {
                    Pending::ChatData { data: data.clone(), is_history }
                };
                let validation = self.validator.check_policy(SignedObject::from(data), 0);
                self.drive(validation, pending);
            }
            FetchTarget::InvitationReply { token } => self.on_invitation_reply(token, data),
            FetchTarget::Certificate { request, pending } => {
                let validation = self.validator.resume(request, data);
                self.drive(validation, pending);
            }
        }
    }

    fn on_fetch_timeout(&mut self, id: FetchId) {
        match self.fetches.on_timeout(id) {
            TimeoutOutcome::Retry(interest) => {
                debug!(%id, name = %interest.name(), "Fetch retry");
                self.transport.express_interest(id, interest);
            }
            TimeoutOutcome::Expired(target) => {
                record_fetch_timeout();
                match target {
                    FetchTarget::ChatData { .. } => debug!(%id, "Chat data fetch gave up"),
                    FetchTarget::InvitationReply { token } => self.on_invitation_timeout(token),
                    FetchTarget::Certificate { request, pending } => {
                        let failure = self.validator.fail_fetch(request);
                        self.on_validation_failed(pending, failure);
                    }
                }
            }
            TimeoutOutcome::Unknown => trace!(%id, "Timeout for a settled fetch"),
        }
    }

    fn on_chat_data(&mut self, data: Data, is_history: bool) {
        let prefix = data.name().prefix(-1);
        let msg = ChatMessage::decode_or_placeholder(data.content());
        record_message_received(msg.msg_type.as_str());

        if msg.msg_type == MessageType::Leave {
            debug!(prefix = %prefix, "Participant left");
            self.roster.remove(&prefix);
            self.view.process_remove(&prefix);
            return;
        }

        let nick = (msg.from != UNKNOWN_SENDER).then_some(msg.from.as_str());
        self.roster.seen(&prefix, nick, now_ms());
        let nick = self.roster.nick(&prefix).unwrap_or(UNKNOWN_SENDER).to_owned();
        self.view.msg_received(&prefix, &nick);

        if msg.is_displayable() {
            self.view.append_message(&msg, is_history);
        }
    }

    fn on_introduction(&mut self, data: Data) {
        let Some(signer) = signer_namespace(&data) else {
            return;
        };
        if !self.introducers.contains(&signer) {
            debug!(signer = %signer, "Introduction from a non-introducer ignored");
            return;
        }

        let intro = match IntroCertificate::from_data(&data) {
            Ok(intro) => intro,
            Err(e) => {
                debug!(name = %data.name(), error = %e, "Undecodable introduction");
                return;
            }
        };
        let namespace = intro.introducee_namespace();
        if &namespace == self.identity.namespace() {
            return;
        }

        info!(
            introducee = %namespace,
            introducer = %signer,
            role = intro.role.as_str(),
            "Participant introduced"
        );
        self.admit(intro.introducee_prefix, intro.introducee, namespace, intro.role);
    }

    // =========================================================================
    // Validation continuations
    // =========================================================================

    /// Run a validation chain until it resolves or needs the network
    fn drive(&mut self, mut validation: Validation, pending: Pending) {
        loop {
            match validation {
                Validation::Resolved(Ok(())) => return self.on_validated(pending),
                Validation::Resolved(Err(failure)) => {
                    return self.on_validation_failed(pending, failure);
                }
                Validation::NeedsFetch(request) => {
                    if let Some(certificate) = self.embedded_certificate(&request) {
                        trace!(name = %certificate.name(), "Using embedded certificate");
                        validation = self.validator.resume(request, certificate.into_data());
                        continue;
                    }

                    let interest = request.interest();
                    let id = self.fetches.register(
                        interest.clone(),
                        self.settings.fetch_retries,
                        FetchTarget::Certificate { request, pending },
                    );
                    self.transport.express_interest(id, interest);
                    return;
                }
            }
        }
    }

    /// Certificate carried by the object under validation, if it is the one requested
    fn embedded_certificate(&self, request: &ValidationRequest) -> Option<Certificate> {
        let certificate = match request.origin()? {
            SignedObject::Interest(interest) => {
                Invitation::parse_signed(interest, &self.settings.broadcast_root)
                    .ok()?
                    .inviter_certificate
            }
            SignedObject::Data(data) => {
                match InvitationReply::parse(data, &data.name().prefix(-1)).ok()? {
                    InvitationReply::Accepted { certificate, .. } => certificate,
                    InvitationReply::Rejected => return None,
                }
            }
        };
        request
            .name
            .is_prefix_of(certificate.name())
            .then_some(certificate)
    }

    fn on_validated(&mut self, pending: Pending) {
        match pending {
            Pending::ChatData { data, is_history } => self.on_chat_data(data, is_history),
            Pending::Introduction { data } => self.on_introduction(data),
            Pending::InvitationReply { token } => self.on_reply_validated(token),
            Pending::IncomingInvitation { token } => {
                let Some(incoming) = self.incoming.get_mut(&token) else {
                    return;
                };
                match incoming.on_validated() {
                    Ok(()) => self.view.invitation_received(token, incoming.invitation()),
                    Err(e) => warn!(token, error = %e, "Invitation state out of step"),
                }
            }
        }
    }

    fn on_validation_failed(&mut self, pending: Pending, failure: ValidationFailure) {
        match pending {
            Pending::ChatData { data, .. } | Pending::Introduction { data } => {
                debug!(name = %data.name(), reason = %failure, "Data failed validation");
            }
            Pending::InvitationReply { token } => {
                if let Some(outgoing) = self.outgoing.get_mut(&token)
                    && let Err(e) = outgoing.on_validation_failed()
                {
                    warn!(token, error = %e, "Invitation state out of step");
                }
                self.finish_outgoing(token);
            }
            Pending::IncomingInvitation { token } => {
                if let Some(mut incoming) = self.incoming.remove(&token) {
                    debug!(
                        inviter = %incoming.invitation().inviter_namespace(),
                        reason = %failure,
                        "Invitation dropped"
                    );
                    if let Err(e) = incoming.on_validation_failed() {
                        warn!(token, error = %e, "Invitation state out of step");
                    }
                }
            }
        }
    }

    // =========================================================================
    // Invitations
    // =========================================================================

    fn send_invitation(&mut self, contact: Contact, is_introducer: bool) -> Result<(), SessionError> {
        self.validator
            .anchors_mut()
            .add_trust_anchor(&contact.certificate);

        let invitation = Invitation::new(
            contact.namespace.clone(),
            self.settings.chatroom.clone(),
            self.outbox.chat_prefix().clone(),
            self.identity.dsk_certificate().clone(),
            now_ms(),
        );
        let mut outgoing =
            OutgoingInvitation::new(invitation, is_introducer, self.settings.invitation_retries);
        let interest = outgoing.send(&self.identity, &self.settings.broadcast_root)?;

        let token = self.next_token();
        self.outgoing.insert(token, outgoing);
        let id = self
            .fetches
            .register(interest.clone(), 0, FetchTarget::InvitationReply { token });
        self.transport.express_interest(id, interest);
        Ok(())
    }

    fn on_invitation_reply(&mut self, token: u64, reply: Data) {
        let Some(outgoing) = self.outgoing.get_mut(&token) else {
            return;
        };

        match outgoing.on_reply(&reply) {
            Ok(ReplyAction::Validate) => {
                let validation = self.validator.check_policy(SignedObject::from(reply), 0);
                self.drive(validation, Pending::InvitationReply { token });
            }
            Ok(ReplyAction::Invalid) => self.finish_outgoing(token),
            Err(e) => warn!(token, error = %e, "Unexpected invitation reply"),
        }
    }

    fn on_invitation_timeout(&mut self, token: u64) {
        let Some(outgoing) = self.outgoing.get_mut(&token) else {
            return;
        };

        match outgoing.on_timeout() {
            Ok(TimeoutAction::Retry(interest)) => {
                let id = self
                    .fetches
                    .register(interest.clone(), 0, FetchTarget::InvitationReply { token });
                self.transport.express_interest(id, interest);
            }
            Ok(TimeoutAction::GiveUp) => self.finish_outgoing(token),
            Err(e) => warn!(token, error = %e, "Invitation state out of step"),
        }
    }

    fn on_reply_validated(&mut self, token: u64) {
        let Some(mut outgoing) = self.outgoing.remove(&token) else {
            return;
        };
        let accepted = match outgoing.on_validated() {
            Ok(ValidatedReply::Accepted(accepted)) => accepted,
            Ok(ValidatedReply::Rejected) => {
                if let Some(text) = outgoing.notification() {
                    self.view.notify(text);
                }
                return;
            }
            Err(e) => {
                warn!(token, error = %e, "Invitation state out of step");
                return;
            }
        };

        let role = IntroRole::from_introducer(accepted.is_introducer);
        self.admit(
            accepted.routing_prefix.clone(),
            accepted.certificate.clone(),
            accepted.namespace.clone(),
            role,
        );

        let intro = IntroCertificate::new(accepted.certificate, accepted.routing_prefix, role);
        match self.outbox.intro(&intro, &self.identity) {
            Ok(data) => self.publish(data),
            Err(e) => warn!(error = %e, "Introduction not published"),
        }
        self.view.notify(format!(
            "{} joined {}",
            accepted.namespace, self.settings.chatroom
        ));
    }

    /// Drop a settled outgoing invitation, telling the user why it failed
    fn finish_outgoing(&mut self, token: u64) {
        if let Some(outgoing) = self.outgoing.remove(&token)
            && let Some(text) = outgoing.notification()
        {
            self.view.notify(text);
        }
    }

    fn on_interest(&mut self, interest: Interest) {
        if invitation_prefix(&self.settings.broadcast_root).is_prefix_of(interest.name()) {
            self.on_invitation(interest);
            return;
        }

        let served = [self.identity.dsk_certificate(), self.identity.ksk_certificate()]
            .into_iter()
            .find(|cert| cert.name_without_version().is_prefix_of(interest.name()))
            .map(|cert| cert.data().clone());

        match served {
            Some(data) => self.transport.put(data),
            None => trace!(name = %interest.name(), "Interest ignored"),
        }
    }

    fn on_invitation(&mut self, interest: Interest) {
        let incoming = match IncomingInvitation::new(interest, &self.settings.broadcast_root) {
            Ok(incoming) => incoming,
            Err(e) => {
                debug!(error = %e, "Malformed invitation dropped");
                return;
            }
        };

        let invitation = incoming.invitation();
        if &invitation.invitee_namespace != self.identity.namespace() {
            debug!(invitee = %invitation.invitee_namespace, "Invitation for another identity");
            return;
        }
        if invitation.chatroom == self.settings.chatroom {
            debug!(chatroom = %invitation.chatroom, "Invitation to a joined chatroom ignored");
            return;
        }
        if self
            .incoming
            .values()
            .any(|known| known.interest().name() == incoming.interest().name())
        {
            trace!("Retransmitted invitation ignored");
            return;
        }

        let token = self.next_token();
        let validation = self
            .validator
            .check_policy(SignedObject::from(incoming.interest().clone()), 0);
        self.incoming.insert(token, incoming);
        self.drive(validation, Pending::IncomingInvitation { token });
    }

    fn respond_invitation(&mut self, token: u64, accept: bool) -> Result<Option<Invitation>, SessionError> {
        let Some(incoming) = self.incoming.get_mut(&token) else {
            return Err(SessionError::UnknownInvitation(token));
        };

        let (reply, joined) = if accept {
            let chatroom = &incoming.invitation().chatroom;
            let prefix = self.settings.chat_prefix(self.identity.namespace(), chatroom);
            let reply = incoming.accept(&self.identity, &prefix)?;
            (reply, Some(incoming.invitation().clone()))
        } else {
            (incoming.reject(&self.identity)?, None)
        };

        self.incoming.remove(&token);
        self.transport.put(reply);
        Ok(joined)
    }
}

impl Actor for ChatSession {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(
            chatroom = %self.settings.chatroom,
            prefix = %self.outbox.chat_prefix(),
            "Chat session starting"
        );
        self.announce(MessageType::Join);
        self.schedule_hello(ctx);
    }

    fn stopping(&mut self, _ctx: &mut Self::Context) -> Running {
        info!(chatroom = %self.settings.chatroom, "Chat session stopping");
        self.fetches.clear();
        Running::Stop
    }
}

// =============================================================================
// Message Handlers
// =============================================================================

impl Handler<TreeUpdate> for ChatSession {
    type Result = ();

    #[instrument(skip(self, msg, _ctx), fields(ranges = msg.missing.len()))]
    fn handle(&mut self, msg: TreeUpdate, _ctx: &mut Self::Context) {
        self.on_tree_update(msg.missing);
    }
}

impl Handler<DataFetched> for ChatSession {
    type Result = ();

    fn handle(&mut self, msg: DataFetched, _ctx: &mut Self::Context) {
        self.on_data(msg.id, msg.data);
    }
}

impl Handler<FetchTimedOut> for ChatSession {
    type Result = ();

    fn handle(&mut self, msg: FetchTimedOut, _ctx: &mut Self::Context) {
        self.on_fetch_timeout(msg.id);
    }
}

impl Handler<InterestReceived> for ChatSession {
    type Result = ();

    fn handle(&mut self, msg: InterestReceived, _ctx: &mut Self::Context) {
        self.on_interest(msg.interest);
    }
}

impl Handler<SendInvitation> for ChatSession {
    type Result = Result<(), SessionError>;

    fn handle(&mut self, msg: SendInvitation, _ctx: &mut Self::Context) -> Self::Result {
        self.send_invitation(msg.contact, msg.is_introducer)
    }
}

impl Handler<RespondInvitation> for ChatSession {
    type Result = Result<Option<Invitation>, SessionError>;

    fn handle(&mut self, msg: RespondInvitation, _ctx: &mut Self::Context) -> Self::Result {
        self.respond_invitation(msg.token, msg.accept)
    }
}

impl Handler<SendChat> for ChatSession {
    type Result = Result<(), SessionError>;

    fn handle(&mut self, msg: SendChat, _ctx: &mut Self::Context) -> Self::Result {
        let (chat, data) = self.outbox.chat(&msg.text, now_ms(), &self.identity)?;
        self.publish(data);
        self.view.append_message(&chat, false);
        Ok(())
    }
}

impl Handler<GetRoster> for ChatSession {
    type Result = Vec<RosterEntry>;

    fn handle(&mut self, _msg: GetRoster, _ctx: &mut Self::Context) -> Self::Result {
        self.roster.entries().cloned().collect()
    }
}

impl Handler<Shutdown> for ChatSession {
    type Result = ();

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) {
        self.announce(MessageType::Leave);
        ctx.stop();
    }
}
