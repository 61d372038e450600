//! Dock-side upload: bring the radio up, drain the dive log, POST each dive
//! as JSON, and shut the radio down again in all cases.

use crate::config::{
    HTTP_TIMEOUT_MS, UPLOAD_URL, WIFI_CONNECT_TIMEOUT_MS, WIFI_PASS,
    WIFI_SSID,
};
use crate::prelude::*;
use crate::storage::{open_dive_log, AppDiveLog};

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write as _;

use dive_mini_bsp::NetResources;
use embassy_futures::select::{select, Either};
use embassy_net::dns::DnsSocket;
use embassy_net::tcp::client::{TcpClient, TcpClientState};
use embassy_net::StackResources;
use dive_mini_icd::DiveRecord;
use esp_radio::wifi::{ClientConfig, ModeConfig};
use reqwless::client::HttpClient;
use reqwless::request::{ContentType, Method, RequestBuilder};
use static_cell::StaticCell;

static NET_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
static TCP_STATE: StaticCell<TcpClientState<1, 1024, 1024>> =
    StaticCell::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UploadError {
    Radio,
    Wifi,
    NoLink,
    Http,
    RejectedByServer,
    Storage,
}

#[embassy_executor::task]
pub async fn upload_task(net: NetResources, sender: EventSender) {
    sender.send(UploadEvent::Connecting.into()).await;
    match run_upload(net).await {
        Ok(dives) => {
            sender.send(UploadEvent::Uploaded { dives }.into()).await
        }
        Err(e) => {
            warn!("upload failed: {}", Debug2Format(&e));
            sender.send(UploadEvent::Failed.into()).await;
        }
    }
}

async fn run_upload(net: NetResources) -> Result<u32, UploadError> {
    let radio = esp_radio::init().map_err(|e| {
        warn!("radio init: {}", Debug2Format(&e));
        UploadError::Radio
    })?;

    let (mut controller, interfaces) = esp_radio::wifi::new(
        &radio,
        net.wifi,
        esp_radio::wifi::Config::default(),
    )
    .map_err(|e| {
        warn!("wifi init: {}", Debug2Format(&e));
        UploadError::Wifi
    })?;

    let client_config = ClientConfig::default()
        .with_ssid(WIFI_SSID.into())
        .with_password(WIFI_PASS.into());
    controller
        .set_config(&ModeConfig::Client(client_config))
        .map_err(|e| {
            warn!("wifi config: {}", Debug2Format(&e));
            UploadError::Wifi
        })?;

    let seed = {
        let mut rng = esp_hal::rng::Rng::new();
        (rng.random() as u64) << 32 | rng.random() as u64
    };
    let (stack, mut runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::<4>::new()),
        seed,
    );

    // The net runner has to be polled for the stack to make progress; it
    // never returns, so the upload future decides when we are done.
    let result = match select(runner.run(), async {
        controller.start_async().await.map_err(|e| {
            warn!("wifi start: {}", Debug2Format(&e));
            UploadError::Wifi
        })?;
        controller.connect_async().await.map_err(|e| {
            warn!("wifi connect: {}", Debug2Format(&e));
            UploadError::Wifi
        })?;
        with_timeout(
            Duration::from_millis(WIFI_CONNECT_TIMEOUT_MS),
            stack.wait_config_up(),
        )
        .await
        .map_err(|_| UploadError::NoLink)?;
        info!("wifi connected, dhcp ready");

        let mut log = open_dive_log();
        upload_dives(stack, &mut log).await
    })
    .await
    {
        Either::First(never) => never,
        Either::Second(result) => result,
    };

    // Release the radio regardless of the outcome.
    if let Err(e) = controller.stop_async().await {
        warn!("wifi stop: {}", Debug2Format(&e));
    }

    result
}

async fn upload_dives(
    stack: embassy_net::Stack<'_>,
    log: &mut AppDiveLog,
) -> Result<u32, UploadError> {
    let tcp_state = TCP_STATE.init(TcpClientState::new());
    let tcp = TcpClient::new(stack, tcp_state);
    let dns = DnsSocket::new(stack);
    let mut client = HttpClient::new(&tcp, &dns);

    let mut uploaded = 0u32;
    loop {
        let records = pop_one_dive(log).await?;
        if records.is_empty() {
            break;
        }

        let payload = render_payload(&records);
        let posted = post_json(&mut client, payload.as_bytes()).await;

        if let Err(e) = posted {
            // Put the dive back so the next docking retries it.
            for record in &records {
                if log.append(record).await.is_err() {
                    warn!("dive re-queue failed, records lost");
                    break;
                }
            }
            return Err(e);
        }
        uploaded += 1;
    }
    Ok(uploaded)
}

/// Pop records up to and including the next `End`, i.e. one whole dive.
async fn pop_one_dive(
    log: &mut AppDiveLog,
) -> Result<Vec<DiveRecord>, UploadError> {
    let mut records = Vec::new();
    loop {
        match log.pop().await.map_err(|e| {
            warn!("dive log pop: {}", Debug2Format(&e));
            UploadError::Storage
        })? {
            None => return Ok(records),
            Some(record) => {
                let done = matches!(record, DiveRecord::End(_));
                records.push(record);
                if done {
                    return Ok(records);
                }
            }
        }
    }
}

fn render_payload(records: &[DiveRecord]) -> String {
    let mut out = String::new();
    out.push_str("{\"device\":\"dive-mini\",\"dive\":{");

    let mut first_sample = true;
    for record in records {
        match record {
            DiveRecord::Start(meta) => {
                let _ = write!(
                    out,
                    "\"id\":\"{}\",\"date\":\"{}\",\"location\":\"{}\",\"diver\":\"{}\",\"samples\":[",
                    meta.id, meta.date, meta.location, meta.diver
                );
            }
            DiveRecord::Sample(s) => {
                if !first_sample {
                    out.push(',');
                }
                first_sample = false;
                let _ = write!(
                    out,
                    "{{\"ts_us\":{},\"temp_c\":{:.2},\"press_bar\":{:.3},\"depth_m\":{:.2}}}",
                    s.timestamp_us, s.temperature_c, s.pressure_bar, s.depth_m
                );
            }
            DiveRecord::End(sum) => {
                let _ = write!(
                    out,
                    "],\"summary\":{{\"samples\":{},\"max_depth_m\":{:.2},\"duration_us\":{}}}",
                    sum.sample_count, sum.max_depth_m, sum.duration_us
                );
            }
        }
    }
    out.push_str("}}");
    out
}

async fn post_json<'a, T, D>(
    client: &mut HttpClient<'a, T, D>,
    body: &[u8],
) -> Result<(), UploadError>
where
    T: embedded_nal_async::TcpConnect + 'a,
    D: embedded_nal_async::Dns + 'a,
{
    let mut rx_buf = [0u8; 1024];
    let mut request = client
        .request(Method::POST, UPLOAD_URL)
        .await
        .map_err(|e| {
            warn!("http request: {}", Debug2Format(&e));
            UploadError::Http
        })?
        .content_type(ContentType::ApplicationJson)
        .body(body);

    let response = with_timeout(
        Duration::from_millis(HTTP_TIMEOUT_MS),
        request.send(&mut rx_buf),
    )
    .await
    .map_err(|_| UploadError::Http)?
    .map_err(|e| {
        warn!("http send: {}", Debug2Format(&e));
        UploadError::Http
    })?;

    info!("http status: {}", Debug2Format(&response.status));
    if response.status.is_successful() {
        Ok(())
    } else {
        Err(UploadError::RejectedByServer)
    }
}
