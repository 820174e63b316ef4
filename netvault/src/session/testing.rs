//! Scripted in-memory sessions for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{Connector, DeviceSession};
use crate::error::SessionError;
use crate::inventory::Device;

pub(crate) const RUNNING_CONFIG: &str = "\
Building configuration...

hostname r1
!
interface GigabitEthernet0/0
 ip address 10.0.0.1 255.255.255.0
!
end";

pub(crate) const VERSION_OUTPUT: &str = "\
Cisco IOS Software, 7200 Software (C7200-ADVENTERPRISEK9-M), Version 15.2(4)M7, RELEASE SOFTWARE (fc2)
Technical Support: http://www.cisco.com/techsupport
ROM: ROMMON Emulation Microcode";

pub(crate) const VERSION_OUTPUT_NPE: &str = "\
Cisco IOS Software, 7200 Software (c7200-demo-npe), Version 15.2, RELEASE SOFTWARE (fc1)";

pub(crate) const INVENTORY_OUTPUT: &str = "\
NAME: \"Chassis\", DESCR: \"Cisco 7206VXR, 6-slot chassis\"
PID: 7206VXR           , VID:    , SN: 4279256517";

pub(crate) const CDP_ENABLED_OUTPUT: &str = "\
Global CDP information:
\tSending CDP packets every 60 seconds
\tSending a holdtime value of 180 seconds";

pub(crate) const CDP_DISABLED_OUTPUT: &str = "% CDP is not enabled";

pub(crate) const CDP_DETAIL_OUTPUT: &str = "\
-------------------------
Device ID: sw1.lab
Entry address(es):
  IP address: 10.0.0.2
Platform: cisco WS-C3560-24PS,  Capabilities: Switch IGMP
Interface: GigabitEthernet0/0,  Port ID (outgoing port): FastEthernet0/1
-------------------------
Device ID: r2.lab
Entry address(es):
  IP address: 10.0.0.3
Platform: Cisco 7206VXR,  Capabilities: Router
Interface: GigabitEthernet0/1,  Port ID (outgoing port): GigabitEthernet0/0";

pub(crate) const PING_OK: &str = "\
Type escape sequence to abort.
Sending 5, 100-byte ICMP Echos to 192.168.0.1, timeout is 2 seconds:
!!!!!
Success rate is 100 percent (5/5), round-trip min/avg/max = 1/2/4 ms";

pub(crate) const PING_LOSS: &str = "\
Type escape sequence to abort.
Sending 5, 100-byte ICMP Echos to 192.168.0.1, timeout is 2 seconds:
.!!!!
Success rate is 80 percent (4/5), round-trip min/avg/max = 1/2/4 ms";

pub(crate) const NTP_SYNCED: &str =
    "Clock is synchronized, stratum 3, reference is 192.168.0.1";

pub(crate) const NTP_UNSYNCED: &str =
    "Clock is unsynchronized, stratum 16, no reference clock";

/// Scripted behaviour for one device.
///
/// Clones share the call log, so a test can keep a clone and inspect the
/// calls after handing the device to a [`ScriptedConnector`].
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedDevice {
    replies: HashMap<String, Result<String, String>>,
    delays: HashMap<String, Duration>,
    open_delay: Option<Duration>,
    refuse: bool,
    panic_on_open: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedDevice {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A healthy IOS router: CDP on, NTP reachable and synchronized.
    pub(crate) fn healthy() -> Self {
        Self::new()
            .reply("show running-config", RUNNING_CONFIG)
            .reply("show version", VERSION_OUTPUT)
            .reply("show inventory", INVENTORY_OUTPUT)
            .reply("show cdp", CDP_ENABLED_OUTPUT)
            .reply("show cdp neighbors detail", CDP_DETAIL_OUTPUT)
            .reply("ping 192.168.0.1", PING_OK)
            .reply("write memory", "[OK]")
            .reply("show ntp status", NTP_SYNCED)
    }

    pub(crate) fn reply(mut self, command: &str, output: &str) -> Self {
        self.replies
            .insert(command.to_string(), Ok(output.to_string()));
        self
    }

    pub(crate) fn fail(mut self, command: &str, message: &str) -> Self {
        self.replies
            .insert(command.to_string(), Err(message.to_string()));
        self
    }

    pub(crate) fn delay(mut self, command: &str, delay: Duration) -> Self {
        self.delays.insert(command.to_string(), delay);
        self
    }

    pub(crate) fn open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub(crate) fn refuse(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub(crate) fn panic_on_open(mut self) -> Self {
        self.panic_on_open = true;
        self
    }

    /// Every call made so far, in order.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

/// Connector handing out [`ScriptedSession`]s by hostname.
#[derive(Debug, Default)]
pub(crate) struct ScriptedConnector {
    devices: HashMap<String, ScriptedDevice>,
}

impl ScriptedConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn device(mut self, hostname: &str, device: ScriptedDevice) -> Self {
        self.devices.insert(hostname.to_string(), device);
        self
    }
}

impl Connector for ScriptedConnector {
    type Session = ScriptedSession;

    async fn open(&self, device: &Device) -> Result<ScriptedSession, SessionError> {
        let script = self
            .devices
            .get(&device.hostname)
            .cloned()
            .unwrap_or_else(|| ScriptedDevice::new().refuse());

        if let Some(delay) = script.open_delay {
            tokio::time::sleep(delay).await;
        }
        if script.panic_on_open {
            panic!("scripted panic for {}", device.hostname);
        }
        if script.refuse {
            return Err(SessionError::ConnectionFailed {
                host: device.address.clone(),
                port: device.port,
                reason: "connection refused".to_string(),
            });
        }

        script.record("open".to_string());
        Ok(ScriptedSession { script })
    }
}

/// Session replaying a [`ScriptedDevice`].
#[derive(Debug)]
pub(crate) struct ScriptedSession {
    script: ScriptedDevice,
}

impl DeviceSession for ScriptedSession {
    async fn send_command(&mut self, command: &str) -> Result<String, SessionError> {
        self.script.record(command.to_string());
        if let Some(delay) = self.script.delays.get(command) {
            tokio::time::sleep(*delay).await;
        }
        match self.script.replies.get(command) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(message)) => Err(SessionError::command(command, message.clone())),
            None => Err(SessionError::command(command, "% Invalid input detected")),
        }
    }

    async fn send_config_set(&mut self, commands: &[String]) -> Result<String, SessionError> {
        self.script
            .record(format!("configure: {}", commands.join("; ")));
        match self.script.replies.get("configure") {
            Some(Err(message)) => Err(SessionError::command("configure terminal", message.clone())),
            _ => Ok(String::new()),
        }
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.script.record("close".to_string());
        Ok(())
    }
}
