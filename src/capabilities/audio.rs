use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::audio::AudioCue;

/// Fire-and-forget playback request handled by the shell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AudioOperation {
    Play(AudioCue),
}

impl Operation for AudioOperation {
    type Output = ();
}

pub struct Audio<E> {
    context: CapabilityContext<AudioOperation, E>,
}

impl<E> Clone for Audio<E> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<Ev> Capability<Ev> for Audio<Ev> {
    type Operation = AudioOperation;
    type MappedSelf<MappedEv> = Audio<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Audio::new(self.context.map_event(f))
    }
}

impl<E> Audio<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<AudioOperation, E>) -> Self {
        Self { context }
    }

    /// Playback outcome is not awaited; failures come back as a separate event.
    pub fn play(&self, cue: AudioCue) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(AudioOperation::Play(cue)).await;
        });
    }
}
