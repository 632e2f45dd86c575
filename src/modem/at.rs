//! Reference `Modem` adapter built on `atat`, covering exactly the six
//! AT operations the core dialogues with (§4.6a). Grounded on the
//! `#[derive(Clone, AtatCmd)]` / `#[at_cmd(...)]` pattern used in the
//! teacher's SMS command module (`ublox-cellular`'s
//! `command::sms::{SetMessageWaitingIndication, ...}`), and on
//! `GsmClient::send_internal` for the "lock, send, map the error" shape.

use atat::atat_derive::{AtatCmd, AtatEnum, AtatResp};
use atat::blocking::AtatClient;
use atat::AtatCmd as _;
use heapless::String;

use super::{Modem, SmsMessage, SMS_FROM_LEN, SMS_TEXT_LEN};
use crate::error::{Error, Result};
use crate::fmt::error as log_error;

#[derive(Clone, AtatCmd)]
#[at_cmd("+CMGR", CmgrResponse, timeout_ms = 5000)]
pub struct ReadSms {
    #[at_arg(position = 0)]
    pub index: u8,
}

/// Captures the `+CMGR: <stat>,<oa>,<alpha>,<scts>` header fields; the
/// message body itself rides along in `text` as atat folds the
/// remaining response bytes (including the body line) into the last
/// declared field.
#[derive(Clone, AtatResp)]
pub struct CmgrResponse {
    #[at_arg(position = 0)]
    pub stat: String<16>,
    #[at_arg(position = 1)]
    pub oa: String<SMS_FROM_LEN>,
    #[at_arg(position = 2)]
    pub alpha: String<16>,
    #[at_arg(position = 3)]
    pub scts: String<24>,
    #[at_arg(position = 4)]
    pub text: String<SMS_TEXT_LEN>,
}

#[derive(Clone, AtatCmd)]
#[at_cmd("+CMGD", atat::NoResponse, timeout_ms = 5000)]
pub struct DeleteSms {
    #[at_arg(position = 0)]
    pub index: u8,
}

#[derive(Clone, AtatCmd)]
#[at_cmd("+CMGS", CmgsResponse, timeout_ms = 15000)]
pub struct SendSms<'a> {
    #[at_arg(position = 0)]
    pub dest: &'a str,
    #[at_arg(position = 1)]
    pub text: &'a str,
}

#[derive(Clone, AtatResp)]
pub struct CmgsResponse {
    #[at_arg(position = 0)]
    pub mr: u16,
}

#[derive(Clone, AtatCmd)]
#[at_cmd("+CSQ", CsqResponse, timeout_ms = 1000)]
pub struct GetSignalQuality;

#[derive(Clone, AtatResp)]
pub struct CsqResponse {
    #[at_arg(position = 0)]
    pub rssi: u8,
    #[at_arg(position = 1)]
    pub ber: u8,
}

#[derive(Clone, AtatCmd)]
#[at_cmd("+CREG?", CregResponse, timeout_ms = 1000)]
pub struct GetRegistrationStatus;

#[derive(Clone, AtatResp)]
pub struct CregResponse {
    #[at_arg(position = 0)]
    pub n: u8,
    #[at_arg(position = 1)]
    pub stat: u8,
}

#[derive(Clone, Copy, PartialEq, Eq, AtatEnum)]
#[at_enum(u8)]
pub enum Functionality {
    Minimum = 0,
    Full = 1,
}

#[derive(Clone, AtatCmd)]
#[at_cmd("+CFUN", atat::NoResponse, timeout_ms = 10000)]
pub struct SetModuleFunctionality {
    #[at_arg(position = 0)]
    pub fun: Functionality,
}

/// Registration status codes meaning "registered" (home or roaming).
const CREG_HOME: u8 = 1;
const CREG_ROAMING: u8 = 5;

/// Adapts any blocking `atat` client into the core's narrow `Modem`
/// contract. Not a general-purpose AT dialect driver: no PDP/GPRS
/// context commands exist here (Non-goals, §1).
pub struct AtModem<C: AtatClient> {
    client: C,
}

impl<C: AtatClient> AtModem<C> {
    pub fn new(client: C) -> Self {
        AtModem { client }
    }

    fn send<Cmd: atat::AtatCmd>(&mut self, cmd: &Cmd) -> Result<Cmd::Response> {
        self.client.send(cmd).map_err(|_| {
            log_error!("AT command failed");
            Error::Modem
        })
    }
}

impl<C: AtatClient> Modem for AtModem<C> {
    fn read_sms(&mut self, index: u8) -> Result<Option<SmsMessage>> {
        let resp = self.send(&ReadSms { index })?;
        if resp.stat.is_empty() {
            return Ok(None);
        }
        let mut from = String::<SMS_FROM_LEN>::new();
        let _ = from.push_str(resp.oa.as_str());
        let mut text = String::<SMS_TEXT_LEN>::new();
        let _ = text.push_str(resp.text.as_str());
        Ok(Some(SmsMessage { from, text }))
    }

    fn delete_sms(&mut self, index: u8) -> Result<()> {
        self.send(&DeleteSms { index }).map(|_| ())
    }

    fn send_sms(&mut self, dest: &str, text: &str) -> Result<()> {
        self.send(&SendSms { dest, text }).map(|_| ())
    }

    fn csq(&mut self) -> Result<u8> {
        let resp = self.send(&GetSignalQuality)?;
        Ok(resp.rssi)
    }

    fn registered(&mut self) -> Result<bool> {
        let resp = self.send(&GetRegistrationStatus)?;
        Ok(resp.stat == CREG_HOME || resp.stat == CREG_ROAMING)
    }

    fn power_cycle(&mut self) -> Result<()> {
        self.send(&SetModuleFunctionality {
            fun: Functionality::Minimum,
        })?;
        self.send(&SetModuleFunctionality {
            fun: Functionality::Full,
        })
        .map(|_| ())
    }
}
