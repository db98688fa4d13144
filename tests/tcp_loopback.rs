//! End-to-end master/slave exchanges over a loopback TCP connection.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;

use modbus_link::{
    Context, ErrorRecovery, ExceptionCode, Mapping, ModbusError, TcpConfig, TimingConfig,
};

fn loopback_config(port: u16) -> TcpConfig {
    TcpConfig {
        address: "127.0.0.1".to_string(),
        port,
        error_recovery: ErrorRecovery::NopOnError,
    }
}

/// Binds a slave on an ephemeral port and serves requests until the client
/// disconnects. Resolves to the mapping so tests can inspect writes.
async fn spawn_slave(mut mapping: Mapping) -> (SocketAddr, JoinHandle<Mapping>) {
    let mut ctx = Context::new_tcp(loopback_config(0));
    let addr = ctx.listen().await.expect("bind slave");

    let handle = tokio::spawn(async move {
        ctx.accept().await.expect("accept client");
        while ctx.serve_request(&mut mapping).await.is_ok() {}
        ctx.close().await;
        mapping
    });

    (addr, handle)
}

async fn connect_master(addr: SocketAddr) -> Context {
    let mut ctx = Context::new_tcp(loopback_config(addr.port()));
    ctx.connect().await.expect("connect master");
    ctx
}

#[tokio::test]
async fn test_register_write_and_read_back() {
    let (addr, slave) = spawn_slave(Mapping::new(0, 0, 16, 0)).await;
    let mut master = connect_master(addr).await;

    master
        .write_single_register(0x01, 5, 0xBEEF)
        .await
        .expect("single write");

    let written = master
        .write_multiple_registers(0x01, 0, &[0x000A, 0x0102])
        .await
        .expect("multiple write");
    assert_eq!(written, 2);

    let mut values = [0u16; 6];
    let read = master
        .read_holding_registers(0x01, 0, 6, &mut values)
        .await
        .expect("read back");
    assert_eq!(read, 6);
    assert_eq!(values[0], 0x000A);
    assert_eq!(values[1], 0x0102);
    assert_eq!(values[5], 0xBEEF);

    master.close().await;
    let mapping = slave.await.unwrap();
    assert_eq!(mapping.holding_registers()[5], 0xBEEF);
}

#[tokio::test]
async fn test_coil_write_and_read_back() {
    let (addr, slave) = spawn_slave(Mapping::new(64, 0, 0, 0)).await;
    let mut master = connect_master(addr).await;

    master
        .write_single_coil(0x01, 0x10, true)
        .await
        .expect("force single coil");

    // Nine coils cross the packing byte boundary.
    let pattern = [true, false, true, true, false, false, false, true, true];
    let written = master
        .write_multiple_coils(0x01, 32, &pattern)
        .await
        .expect("force multiple coils");
    assert_eq!(written, 9);

    let mut bits = [false; 9];
    master
        .read_coils(0x01, 32, 9, &mut bits)
        .await
        .expect("read coils");
    assert_eq!(bits, pattern);

    let mut single = [false; 1];
    master
        .read_coils(0x01, 0x10, 1, &mut single)
        .await
        .expect("read single coil");
    assert!(single[0]);

    master.close().await;
    let mapping = slave.await.unwrap();
    assert!(mapping.coils()[0x10]);
}

#[tokio::test]
async fn test_read_only_tables() {
    let mut mapping = Mapping::new(0, 4, 0, 4);
    mapping.discrete_inputs_mut()[2] = true;
    mapping.input_registers_mut()[0] = 0x4242;

    let (addr, _slave) = spawn_slave(mapping).await;
    let mut master = connect_master(addr).await;

    let mut inputs = [false; 4];
    master
        .read_discrete_inputs(0x01, 0, 4, &mut inputs)
        .await
        .expect("read discrete inputs");
    assert_eq!(inputs, [false, false, true, false]);

    let mut words = [0u16; 1];
    master
        .read_input_registers(0x01, 0, 1, &mut words)
        .await
        .expect("read input registers");
    assert_eq!(words[0], 0x4242);

    master.close().await;
}

#[tokio::test]
async fn test_out_of_range_address_returns_exception() {
    let (addr, _slave) = spawn_slave(Mapping::new(0, 0, 10, 0)).await;
    let mut master = connect_master(addr).await;

    let mut values = [0u16; 1];
    let err = master
        .read_holding_registers(0x01, 0xFF00, 1, &mut values)
        .await
        .expect_err("address beyond the table");

    assert_eq!(err.exception_code(), Some(ExceptionCode::IllegalDataAddress));

    // The connection survives an exception reply.
    master
        .read_holding_registers(0x01, 0, 1, &mut values)
        .await
        .expect("valid read after exception");

    master.close().await;
}

#[tokio::test]
async fn test_unsupported_function_hits_exception_heuristic() {
    // The slave rejects report-slave-id, so the master sees a reply shorter
    // than the oracle's expectation and recovers the exception from it.
    let (addr, _slave) = spawn_slave(Mapping::new(0, 0, 1, 0)).await;
    let mut master = connect_master(addr).await;

    let mut id = [0u8; 32];
    let err = master
        .report_slave_id(0x01, &mut id)
        .await
        .expect_err("slave does not implement 0x11");

    assert_eq!(err.exception_code(), Some(ExceptionCode::IllegalFunction));

    master.close().await;
}

#[tokio::test]
async fn test_silent_slave_times_out() {
    // A listener that accepts and never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let mut master = Context::new_tcp(loopback_config(addr.port()));
    master.set_timing(TimingConfig {
        response_timeout: Duration::from_millis(100),
        byte_timeout: Duration::from_millis(20),
        request_timeout: Duration::from_secs(1),
    });
    master.connect().await.expect("connect");

    let mut values = [0u16; 1];
    let err = master
        .read_holding_registers(0x01, 0, 1, &mut values)
        .await
        .expect_err("nobody answers");
    assert!(err.is_timeout(), "unexpected error: {err}");

    master.close().await;
    server.abort();
}

#[tokio::test]
async fn test_slave_state_machine_with_dripped_bytes() {
    let mut mapping = Mapping::new(0, 0, 4, 0);
    mapping.holding_registers_mut()[0] = 0x1234;
    let (addr, _slave) = spawn_slave(mapping).await;

    // A raw client that delivers the query one byte at a time, forcing the
    // receive engine through every state transition.
    let mut socket = tokio::net::TcpStream::connect(addr).await.unwrap();
    let query = [
        0x00, 0x2A, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x01,
    ];
    for byte in query {
        socket.write_all(&[byte]).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let mut reply = [0u8; 11];
    socket.read_exact(&mut reply).await.unwrap();
    assert_eq!(
        reply,
        [0x00, 0x2A, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x12, 0x34]
    );
}

#[tokio::test]
async fn test_oversized_request_rejected_before_sending() {
    let (addr, _slave) = spawn_slave(Mapping::new(0, 0, 1, 0)).await;
    let mut master = connect_master(addr).await;

    let mut values = vec![0u16; 200];
    let err = master
        .read_holding_registers(0x01, 0, 126, &mut values)
        .await
        .expect_err("count above the register read limit");
    assert!(matches!(err, ModbusError::Frame(_)), "got {err}");

    master.close().await;
}
